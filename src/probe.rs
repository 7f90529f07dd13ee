//! Compile probe: tokenize and parse a source text without executing it.

use crate::ast::{Stmt, StmtKind};
use crate::error::SyntaxError;
use crate::parser::{parse, Mode};
use crate::tokenizer::{ends_with_blank_line, tokenize};
use crate::types::CompilerFlags;

/// Result of compiling a source as a single interactive statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileOutcome {
    Complete,
    /// Failed only because input ended too early.
    Incomplete,
    Invalid,
}

/// A compiled unit ready for the evaluator.
#[derive(Debug, Clone)]
pub struct Unit {
    pub body: Vec<Stmt>,
    pub mode: Mode,
    /// Future features declared at the top of the unit.
    pub future: CompilerFlags,
}

/// Compile `source` in the given mode.
///
/// Empty and comment-only sources compile to an empty body.
pub fn compile(source: &str, mode: Mode) -> Result<Unit, SyntaxError> {
    let tokens = tokenize(source, mode == Mode::Exec)?;
    let body = parse(tokens, mode, ends_with_blank_line(source))?;
    let future = future_flags(&body)?;
    Ok(Unit { body, mode, future })
}

/// Classify `source` as a single interactive statement.
pub fn probe(source: &str) -> CompileOutcome {
    match compile(source, Mode::Single) {
        Ok(_) => CompileOutcome::Complete,
        Err(err) if err.is_incomplete() => CompileOutcome::Incomplete,
        Err(_) => CompileOutcome::Invalid,
    }
}

fn is_future_import(stmt: &Stmt) -> bool {
    matches!(&stmt.kind, StmtKind::ImportFrom { module, .. } if module == "__future__")
}

/// Collect the flags of leading `from __future__ import` statements, and
/// reject unknown features or future imports after other statements.
fn future_flags(body: &[Stmt]) -> Result<CompilerFlags, SyntaxError> {
    let mut flags = CompilerFlags::empty();
    let leading = body.iter().take_while(|stmt| is_future_import(stmt)).count();

    for stmt in &body[..leading] {
        if let StmtKind::ImportFrom { names, .. } = &stmt.kind {
            for name in names {
                if name == "braces" {
                    return Err(SyntaxError::invalid("not a chance", stmt.line, 0));
                }
                match CompilerFlags::from_feature(name) {
                    Some(flag) => flags |= flag,
                    None => {
                        return Err(SyntaxError::invalid(
                            format!("future feature {} is not defined", name),
                            stmt.line,
                            0,
                        ))
                    }
                }
            }
        }
    }

    if let Some(late) = body[leading..].iter().find(|stmt| is_future_import(stmt)) {
        return Err(SyntaxError::invalid(
            "from __future__ imports must occur at the beginning of the file",
            late.line,
            0,
        ));
    }
    Ok(flags)
}
