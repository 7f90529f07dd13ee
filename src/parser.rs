//! Recursive-descent parser for the host language.

use std::collections::HashSet;
use std::rc::Rc;

use crate::ast::{BinOp, BoolOp, CmpOp, Expr, FunctionDef, Param, Stmt, StmtKind, UnaryOp};
use crate::error::{NeedMoreReason, SyntaxError};
use crate::tokenizer::{is_keyword, Token, TokenKind};

/// Compile mode, mirroring the interactive/script split of the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Exactly one interactive statement; indented blocks need a trailing
    /// blank line to be complete.
    Single,
    /// A whole script; end of input closes every open block.
    Exec,
}

/// Parse `tokens` (produced by the tokenizer for the same mode) into a list
/// of top-level statements.
///
/// `terminated` tells the parser whether the source ended with a blank line;
/// it decides whether a missing block is "needs more input" or an error.
pub fn parse(tokens: Vec<Token>, mode: Mode, terminated: bool) -> Result<Vec<Stmt>, SyntaxError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        terminated: terminated || mode == Mode::Exec,
        loop_depth: 0,
        func_depth: 0,
    };
    parser.module(mode)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    terminated: bool,
    loop_depth: usize,
    func_depth: usize,
}

const AUGMENTED: &[(&str, BinOp)] = &[
    ("+=", BinOp::Add),
    ("-=", BinOp::Sub),
    ("*=", BinOp::Mul),
    ("/=", BinOp::Div),
    ("//=", BinOp::FloorDiv),
    ("%=", BinOp::Mod),
    ("**=", BinOp::Pow),
];

impl Parser {
    // ========== Token helpers ==========

    fn peek(&self) -> &Token {
        // The tokenizer always ends the stream with an EndMarker.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_nth(&self, n: usize) -> &Token {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at_op(&self, op: &str) -> bool {
        self.peek().is_op(op)
    }

    fn at_keyword(&self, word: &str) -> bool {
        self.peek().is_name(word)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.at_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.at_keyword(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn at_newline(&self) -> bool {
        self.peek().kind == TokenKind::Newline
    }

    /// Error for the current token. Running into the end of an unterminated
    /// interactive input means more lines could still fix it.
    fn unexpected(&self) -> SyntaxError {
        let token = self.peek();
        if token.kind == TokenKind::EndMarker && !self.terminated {
            return SyntaxError::incomplete(NeedMoreReason::UnclosedBlock, token.line, token.column);
        }
        let message = match token.kind {
            TokenKind::Indent => "unexpected indent".to_string(),
            TokenKind::Dedent => "unindent does not match any outer indentation level".to_string(),
            _ => "invalid syntax".to_string(),
        };
        SyntaxError::invalid(message, token.line, token.column)
    }

    fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        let token = self.peek();
        SyntaxError::invalid(message, token.line, token.column)
    }

    fn expect_op(&mut self, op: &str) -> Result<(), SyntaxError> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<(), SyntaxError> {
        if self.eat_keyword(word) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_newline(&mut self) -> Result<(), SyntaxError> {
        if self.at_newline() {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn identifier(&mut self) -> Result<String, SyntaxError> {
        match self.peek().kind.clone() {
            TokenKind::Name(name) if !is_keyword(&name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    // ========== Statements ==========

    fn module(&mut self, mode: Mode) -> Result<Vec<Stmt>, SyntaxError> {
        let mut body = Vec::new();
        while self.at_newline() {
            self.advance();
        }
        match mode {
            Mode::Single => {
                if self.peek().kind != TokenKind::EndMarker {
                    body = self.statement()?;
                }
                if self.peek().kind != TokenKind::EndMarker {
                    return Err(self.error_here(
                        "multiple statements found while compiling a single statement",
                    ));
                }
            }
            Mode::Exec => {
                while self.peek().kind != TokenKind::EndMarker {
                    body.extend(self.statement()?);
                }
            }
        }
        Ok(body)
    }

    fn statement(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let line = self.peek().line;
        let kind = match self.peek().kind.clone() {
            TokenKind::Name(word) => match word.as_str() {
                "if" => Some(self.if_stmt()?),
                "while" => Some(self.while_stmt()?),
                "for" => Some(self.for_stmt()?),
                "def" => Some(self.funcdef()?),
                "class" => Some(self.classdef()?),
                _ => None,
            },
            TokenKind::Indent | TokenKind::Dedent | TokenKind::EndMarker => {
                return Err(self.unexpected())
            }
            _ => None,
        };
        match kind {
            Some(kind) => Ok(vec![Stmt { kind, line }]),
            None => self.simple_stmt(),
        }
    }

    /// `small_stmt (';' small_stmt)* [';'] NEWLINE`
    fn simple_stmt(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let mut stmts = Vec::new();
        loop {
            let line = self.peek().line;
            let kind = self.small_stmt()?;
            stmts.push(Stmt { kind, line });
            if !self.eat_op(";") || self.at_newline() {
                break;
            }
        }
        self.expect_newline()?;
        Ok(stmts)
    }

    fn small_stmt(&mut self) -> Result<StmtKind, SyntaxError> {
        let word = match self.peek().kind.clone() {
            TokenKind::Name(word) => word,
            _ => return self.expr_stmt(),
        };
        match word.as_str() {
            "pass" => {
                self.advance();
                Ok(StmtKind::Pass)
            }
            "break" | "continue" => {
                if self.loop_depth == 0 {
                    return Err(self.error_here(format!("'{}' outside loop", word)));
                }
                self.advance();
                Ok(if word == "break" {
                    StmtKind::Break
                } else {
                    StmtKind::Continue
                })
            }
            "return" => {
                if self.func_depth == 0 {
                    return Err(self.error_here("'return' outside function"));
                }
                self.advance();
                let value = if self.at_end_of_small_stmt() {
                    None
                } else {
                    Some(self.testlist()?)
                };
                Ok(StmtKind::Return(value))
            }
            "raise" => {
                self.advance();
                let value = if self.at_end_of_small_stmt() {
                    None
                } else {
                    Some(self.test()?)
                };
                Ok(StmtKind::Raise(value))
            }
            "assert" => {
                self.advance();
                let test = self.test()?;
                let msg = if self.eat_op(",") {
                    Some(self.test()?)
                } else {
                    None
                };
                Ok(StmtKind::Assert { test, msg })
            }
            "global" => {
                self.advance();
                let mut names = vec![self.identifier()?];
                while self.eat_op(",") {
                    names.push(self.identifier()?);
                }
                Ok(StmtKind::Global(names))
            }
            "del" => {
                self.advance();
                let mut targets = vec![self.expr()?];
                while self.eat_op(",") {
                    if self.at_end_of_small_stmt() {
                        break;
                    }
                    targets.push(self.expr()?);
                }
                for target in &targets {
                    if !matches!(target, Expr::Name(_) | Expr::Subscript { .. } | Expr::Attribute { .. }) {
                        return Err(self.error_here("can't delete expression"));
                    }
                }
                Ok(StmtKind::Del(targets))
            }
            "import" => {
                self.advance();
                let mut names = vec![self.dotted_name()?];
                while self.eat_op(",") {
                    names.push(self.dotted_name()?);
                }
                Ok(StmtKind::Import(names))
            }
            "from" => {
                self.advance();
                let module = self.dotted_name()?;
                self.expect_keyword("import")?;
                let mut names = Vec::new();
                if self.eat_op("*") {
                    names.push("*".to_string());
                } else {
                    let parenthesized = self.eat_op("(");
                    names.push(self.identifier()?);
                    while self.eat_op(",") {
                        if parenthesized && self.at_op(")") {
                            break;
                        }
                        names.push(self.identifier()?);
                    }
                    if parenthesized {
                        self.expect_op(")")?;
                    }
                }
                Ok(StmtKind::ImportFrom { module, names })
            }
            _ => self.expr_stmt(),
        }
    }

    fn at_end_of_small_stmt(&self) -> bool {
        self.at_newline() || self.at_op(";")
    }

    fn dotted_name(&mut self) -> Result<String, SyntaxError> {
        let mut name = self.identifier()?;
        while self.eat_op(".") {
            name.push('.');
            name.push_str(&self.identifier()?);
        }
        Ok(name)
    }

    fn expr_stmt(&mut self) -> Result<StmtKind, SyntaxError> {
        let first = self.testlist()?;

        if let TokenKind::Op(op) = self.peek().kind.clone() {
            if let Some(&(_, bin)) = AUGMENTED.iter().find(|(sym, _)| *sym == op) {
                if !matches!(first, Expr::Name(_) | Expr::Attribute { .. } | Expr::Subscript { .. }) {
                    return Err(self.error_here("illegal expression for augmented assignment"));
                }
                self.advance();
                let value = self.testlist()?;
                return Ok(StmtKind::AugAssign {
                    target: first,
                    op: bin,
                    value,
                });
            }
        }

        if !self.at_op("=") {
            return Ok(StmtKind::Expr(first));
        }

        let mut targets = vec![first];
        let mut value;
        loop {
            self.expect_op("=")?;
            value = self.testlist()?;
            if !self.at_op("=") {
                break;
            }
            targets.push(value);
        }
        for target in &targets {
            if !target.is_assignable() {
                return Err(self.error_here("can't assign to literal"));
            }
        }
        Ok(StmtKind::Assign { targets, value })
    }

    /// Parse the body after a block header's `:`.
    fn suite(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        if !self.at_newline() {
            return self.simple_stmt();
        }
        self.advance();

        let token = self.peek().clone();
        match token.kind {
            TokenKind::Indent => {
                self.advance();
            }
            TokenKind::EndMarker if !self.terminated => {
                return Err(SyntaxError::incomplete(
                    NeedMoreReason::MissingBlock,
                    token.line,
                    token.column,
                ))
            }
            _ => return Err(SyntaxError::invalid("expected an indented block", token.line, token.column)),
        }

        let mut body = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::Dedent => {
                    self.advance();
                    return Ok(body);
                }
                TokenKind::EndMarker => return Err(self.unexpected()),
                _ => body.extend(self.statement()?),
            }
        }
    }

    fn loop_body(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        self.loop_depth += 1;
        let body = self.suite();
        self.loop_depth -= 1;
        body
    }

    fn else_clause(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        if self.eat_keyword("else") {
            self.expect_op(":")?;
            self.suite()
        } else {
            Ok(Vec::new())
        }
    }

    fn if_stmt(&mut self) -> Result<StmtKind, SyntaxError> {
        self.advance();
        let test = self.test()?;
        self.expect_op(":")?;
        let body = self.suite()?;
        let orelse = if self.at_keyword("elif") {
            let line = self.peek().line;
            let kind = self.if_stmt()?;
            vec![Stmt { kind, line }]
        } else {
            self.else_clause()?
        };
        Ok(StmtKind::If { test, body, orelse })
    }

    fn while_stmt(&mut self) -> Result<StmtKind, SyntaxError> {
        self.advance();
        let test = self.test()?;
        self.expect_op(":")?;
        let body = self.loop_body()?;
        let orelse = self.else_clause()?;
        Ok(StmtKind::While { test, body, orelse })
    }

    fn for_stmt(&mut self) -> Result<StmtKind, SyntaxError> {
        self.advance();
        let target = self.exprlist()?;
        if !target.is_assignable() {
            return Err(self.error_here("can't assign to literal"));
        }
        self.expect_keyword("in")?;
        let iter = self.testlist()?;
        self.expect_op(":")?;
        let body = self.loop_body()?;
        let orelse = self.else_clause()?;
        Ok(StmtKind::For {
            target,
            iter,
            body,
            orelse,
        })
    }

    fn funcdef(&mut self) -> Result<StmtKind, SyntaxError> {
        self.advance();
        let name = self.identifier()?;
        self.expect_op("(")?;

        let mut params: Vec<Param> = Vec::new();
        let mut seen = HashSet::new();
        while !self.at_op(")") {
            let param_name = self.identifier()?;
            if !seen.insert(param_name.clone()) {
                return Err(self.error_here("duplicate argument in function definition"));
            }
            let default = if self.eat_op("=") {
                Some(self.test()?)
            } else {
                if params.iter().any(|p| p.default.is_some()) {
                    return Err(self.error_here("non-default argument follows default argument"));
                }
                None
            };
            params.push(Param {
                name: param_name,
                default,
            });
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op(")")?;
        if self.eat_op("->") {
            self.test()?;
        }
        self.expect_op(":")?;

        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);
        self.func_depth += 1;
        let body = self.suite();
        self.func_depth -= 1;
        self.loop_depth = saved_loops;

        Ok(StmtKind::FunctionDef(Rc::new(FunctionDef {
            name,
            params,
            body: body?,
        })))
    }

    fn classdef(&mut self) -> Result<StmtKind, SyntaxError> {
        self.advance();
        let name = self.identifier()?;
        let mut bases = Vec::new();
        if self.eat_op("(") {
            while !self.at_op(")") {
                bases.push(self.test()?);
                if !self.eat_op(",") {
                    break;
                }
            }
            self.expect_op(")")?;
        }
        self.expect_op(":")?;

        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);
        let saved_funcs = std::mem::replace(&mut self.func_depth, 0);
        let body = self.suite();
        self.loop_depth = saved_loops;
        self.func_depth = saved_funcs;

        Ok(StmtKind::ClassDef {
            name,
            bases,
            body: body?,
        })
    }

    // ========== Expressions ==========

    /// `test (',' test)* [',']`, producing a tuple when a comma is present.
    fn testlist(&mut self) -> Result<Expr, SyntaxError> {
        self.sequence(Self::test)
    }

    /// Assignment targets of `for` and `del`: comparisons are not allowed.
    fn exprlist(&mut self) -> Result<Expr, SyntaxError> {
        self.sequence(Self::expr)
    }

    fn sequence(
        &mut self,
        item: fn(&mut Self) -> Result<Expr, SyntaxError>,
    ) -> Result<Expr, SyntaxError> {
        let first = item(self)?;
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if !self.starts_expression() {
                break;
            }
            items.push(item(self)?);
        }
        Ok(Expr::Tuple(items))
    }

    fn starts_expression(&self) -> bool {
        match &self.peek().kind {
            TokenKind::Name(name) => {
                !is_keyword(name) || matches!(name.as_str(), "not" | "True" | "False" | "None" | "lambda")
            }
            TokenKind::Int(_) | TokenKind::Float(_) | TokenKind::Str(_) => true,
            TokenKind::Op(op) => matches!(*op, "(" | "[" | "{" | "-" | "+" | "~"),
            _ => false,
        }
    }

    fn test(&mut self) -> Result<Expr, SyntaxError> {
        if self.at_keyword("lambda") {
            return Err(self.error_here("lambda expressions are not supported"));
        }
        let body = self.or_test()?;
        if !self.at_keyword("if") {
            return Ok(body);
        }
        self.advance();
        let test = self.or_test()?;
        self.expect_keyword("else")?;
        let orelse = self.test()?;
        Ok(Expr::IfExp {
            test: Box::new(test),
            body: Box::new(body),
            orelse: Box::new(orelse),
        })
    }

    fn or_test(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.and_test()?;
        while self.eat_keyword("or") {
            let right = self.and_test()?;
            left = Expr::BoolOp {
                op: BoolOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and_test(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.not_test()?;
        while self.eat_keyword("and") {
            let right = self.not_test()?;
            left = Expr::BoolOp {
                op: BoolOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn not_test(&mut self) -> Result<Expr, SyntaxError> {
        if self.eat_keyword("not") {
            let operand = self.not_test()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, SyntaxError> {
        let left = self.expr()?;
        let mut ops = Vec::new();
        while let Some(op) = self.comp_op() {
            let right = self.expr()?;
            ops.push((op, right));
        }
        if ops.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare {
                left: Box::new(left),
                ops,
            })
        }
    }

    fn comp_op(&mut self) -> Option<CmpOp> {
        let op = match self.peek().kind.clone() {
            TokenKind::Op("==") => CmpOp::Eq,
            TokenKind::Op("!=") => CmpOp::NotEq,
            TokenKind::Op("<") => CmpOp::Lt,
            TokenKind::Op("<=") => CmpOp::LtE,
            TokenKind::Op(">") => CmpOp::Gt,
            TokenKind::Op(">=") => CmpOp::GtE,
            TokenKind::Name(n) if n == "in" => CmpOp::In,
            TokenKind::Name(n) if n == "not" && self.peek_nth(1).is_name("in") => {
                self.advance();
                CmpOp::NotIn
            }
            TokenKind::Name(n) if n == "is" => {
                if self.peek_nth(1).is_name("not") {
                    self.advance();
                    CmpOp::IsNot
                } else {
                    CmpOp::Is
                }
            }
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    /// Arithmetic expression: `term (('+'|'-') term)*`.
    fn expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.term()?;
        loop {
            let op = if self.at_op("+") {
                BinOp::Add
            } else if self.at_op("-") {
                BinOp::Sub
            } else {
                return Ok(left);
            };
            self.advance();
            let right = self.term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn term(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.factor()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Op("*") => BinOp::Mul,
                TokenKind::Op("/") => BinOp::Div,
                TokenKind::Op("//") => BinOp::FloorDiv,
                TokenKind::Op("%") => BinOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.factor()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn factor(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.peek().kind {
            TokenKind::Op("-") => UnaryOp::Neg,
            TokenKind::Op("+") => UnaryOp::Pos,
            _ => return self.power(),
        };
        self.advance();
        let operand = self.factor()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn power(&mut self) -> Result<Expr, SyntaxError> {
        let base = self.atom_expr()?;
        if self.eat_op("**") {
            let exponent = self.factor()?;
            return Ok(Expr::Binary {
                op: BinOp::Pow,
                left: Box::new(base),
                right: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn atom_expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut value = self.atom()?;
        loop {
            if self.eat_op("(") {
                let (args, keywords) = self.arglist()?;
                self.expect_op(")")?;
                value = Expr::Call {
                    func: Box::new(value),
                    args,
                    keywords,
                };
            } else if self.eat_op("[") {
                let index = self.testlist()?;
                if self.at_op(":") {
                    return Err(self.error_here("slicing is not supported"));
                }
                self.expect_op("]")?;
                value = Expr::Subscript {
                    value: Box::new(value),
                    index: Box::new(index),
                };
            } else if self.eat_op(".") {
                let attr = self.identifier()?;
                value = Expr::Attribute {
                    value: Box::new(value),
                    attr,
                };
            } else {
                return Ok(value);
            }
        }
    }

    fn arglist(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), SyntaxError> {
        let mut args = Vec::new();
        let mut keywords: Vec<(String, Expr)> = Vec::new();
        while !self.at_op(")") {
            let keyword = match &self.peek().kind {
                TokenKind::Name(name) if !is_keyword(name) && self.peek_nth(1).is_op("=") => {
                    Some(name.clone())
                }
                _ => None,
            };
            if let Some(name) = keyword {
                self.advance();
                self.advance();
                if keywords.iter().any(|(k, _)| *k == name) {
                    return Err(self.error_here("keyword argument repeated"));
                }
                keywords.push((name, self.test()?));
            } else {
                if !keywords.is_empty() {
                    return Err(self.error_here("non-keyword arg after keyword arg"));
                }
                args.push(self.test()?);
            }
            if !self.eat_op(",") {
                break;
            }
        }
        Ok((args, keywords))
    }

    fn atom(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.peek().clone();
        let expr = match token.kind {
            TokenKind::Int(n) => Expr::Int(n),
            TokenKind::Float(f) => Expr::Float(f),
            TokenKind::Str(s) => Expr::Str(s),
            TokenKind::Name(name) => match name.as_str() {
                "True" => Expr::Bool(true),
                "False" => Expr::Bool(false),
                "None" => Expr::None,
                _ if is_keyword(&name) => return Err(self.unexpected()),
                _ => Expr::Name(name),
            },
            TokenKind::Op("(") => {
                self.advance();
                if self.eat_op(")") {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let inner = self.testlist()?;
                self.expect_op(")")?;
                return Ok(inner);
            }
            TokenKind::Op("[") => {
                self.advance();
                let mut items = Vec::new();
                while !self.at_op("]") {
                    items.push(self.test()?);
                    if !self.eat_op(",") {
                        break;
                    }
                }
                self.expect_op("]")?;
                return Ok(Expr::List(items));
            }
            TokenKind::Op("{") => {
                self.advance();
                let mut items = Vec::new();
                while !self.at_op("}") {
                    let key = self.test()?;
                    self.expect_op(":")?;
                    let value = self.test()?;
                    items.push((key, value));
                    if !self.eat_op(",") {
                        break;
                    }
                }
                self.expect_op("}")?;
                return Ok(Expr::Dict(items));
            }
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(expr)
    }
}
