//! Error types and Result aliases for snek

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the console session
#[derive(Debug, Error)]
pub enum Error {
    /// The buffer can never parse; it was discarded without executing
    #[error(transparent)]
    SyntaxRejected(#[from] SyntaxError),

    /// The external editor round trip failed; the session was left unchanged
    #[error(transparent)]
    Editor(#[from] EditorError),

    /// Configuration file could not be read or parsed
    #[error("failed to load config from {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    /// History file or other I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reason why a compile attempt needs more input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeedMoreReason {
    /// A `(`, `[` or `{` is still open.
    UnclosedBracket,
    /// A triple-quoted string reached end of input.
    UnterminatedTripleQuote,
    /// A trailing backslash escapes the line terminator.
    TrailingBackslash,
    /// A block header reached end of input before its indented body.
    MissingBlock,
    /// An indented block has not been closed by a blank line.
    UnclosedBlock,
}

/// Whether a syntax error could be cured by appending more text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    Incomplete(NeedMoreReason),
    Invalid,
}

/// A compile-time error with its location (1-based line, 0-based column).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("SyntaxError: {message} (line {line}, column {column})")]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl SyntaxError {
    pub fn invalid(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind: SyntaxErrorKind::Invalid,
            message: message.into(),
            line,
            column,
        }
    }

    pub fn incomplete(reason: NeedMoreReason, line: usize, column: usize) -> Self {
        let message = match reason {
            NeedMoreReason::UnclosedBracket => "unexpected EOF while parsing",
            NeedMoreReason::UnterminatedTripleQuote => "EOF while scanning triple-quoted string literal",
            NeedMoreReason::TrailingBackslash => "unexpected EOF after line continuation",
            NeedMoreReason::MissingBlock => "expected an indented block",
            NeedMoreReason::UnclosedBlock => "unexpected EOF while parsing",
        };
        Self {
            kind: SyntaxErrorKind::Incomplete(reason),
            message: message.to_string(),
            line,
            column,
        }
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self.kind, SyntaxErrorKind::Incomplete(_))
    }

    /// Render the error the way the console prints it, with a caret under
    /// the offending column of the source line.
    pub fn render(&self, source: &str) -> String {
        let mut out = format!("  File \"<input>\", line {}\n", self.line);
        if let Some(text) = source.lines().nth(self.line.saturating_sub(1)) {
            let trimmed = text.trim_start();
            let skipped = text.chars().count() - trimmed.chars().count();
            out.push_str(&format!("    {}\n", trimmed.trim_end()));
            out.push_str(&format!("    {}^\n", " ".repeat(self.column.saturating_sub(skipped))));
        }
        out.push_str(&format!("SyntaxError: {}\n", self.message));
        out
    }
}

/// Failures of the external editor round trip.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("no editor configured")]
    NotConfigured,

    #[error("failed to launch editor `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("editor `{command}` exited with {status}")]
    ExitStatus { command: String, status: String },

    #[error("edited text is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("temporary file error: {0}")]
    TempFile(#[from] std::io::Error),
}

/// Builtin exception classes of the host language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    Exception,
    ArithmeticError,
    AssertionError,
    AttributeError,
    ImportError,
    IndexError,
    KeyError,
    NameError,
    OverflowError,
    RuntimeError,
    TypeError,
    ValueError,
    ZeroDivisionError,
}

impl ExceptionKind {
    pub const ALL: [ExceptionKind; 13] = [
        ExceptionKind::Exception,
        ExceptionKind::ArithmeticError,
        ExceptionKind::AssertionError,
        ExceptionKind::AttributeError,
        ExceptionKind::ImportError,
        ExceptionKind::IndexError,
        ExceptionKind::KeyError,
        ExceptionKind::NameError,
        ExceptionKind::OverflowError,
        ExceptionKind::RuntimeError,
        ExceptionKind::TypeError,
        ExceptionKind::ValueError,
        ExceptionKind::ZeroDivisionError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExceptionKind::Exception => "Exception",
            ExceptionKind::ArithmeticError => "ArithmeticError",
            ExceptionKind::AssertionError => "AssertionError",
            ExceptionKind::AttributeError => "AttributeError",
            ExceptionKind::ImportError => "ImportError",
            ExceptionKind::IndexError => "IndexError",
            ExceptionKind::KeyError => "KeyError",
            ExceptionKind::NameError => "NameError",
            ExceptionKind::OverflowError => "OverflowError",
            ExceptionKind::RuntimeError => "RuntimeError",
            ExceptionKind::TypeError => "TypeError",
            ExceptionKind::ValueError => "ValueError",
            ExceptionKind::ZeroDivisionError => "ZeroDivisionError",
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A runtime error raised while evaluating host-language code.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct Exception {
    pub kind: ExceptionKind,
    pub message: String,
    /// Line of the innermost statement that was executing.
    pub line: Option<usize>,
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl Exception {
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::TypeError, message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::ValueError, message)
    }

    pub fn name_error(name: &str) -> Self {
        Self::new(ExceptionKind::NameError, format!("name '{}' is not defined", name))
    }

    /// Attach a line number unless an inner statement already did.
    pub fn at_line(mut self, line: usize) -> Self {
        self.line.get_or_insert(line);
        self
    }

    /// Render as a traceback block for the transcript.
    pub fn traceback(&self) -> String {
        let mut out = String::from("Traceback (most recent call last):\n");
        if let Some(line) = self.line {
            out.push_str(&format!("  File \"<input>\", line {}, in <module>\n", line));
        }
        out.push_str(&format!("{}\n", self));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_points_at_column() {
        let err = SyntaxError::invalid("invalid syntax", 1, 10);
        let rendered = err.render("def foo(x)");
        assert_eq!(
            rendered,
            "  File \"<input>\", line 1\n    def foo(x)\n              ^\nSyntaxError: invalid syntax\n"
        );
    }

    #[test]
    fn test_incomplete_kind() {
        let err = SyntaxError::incomplete(NeedMoreReason::UnclosedBracket, 1, 3);
        assert!(err.is_incomplete());
        assert!(!SyntaxError::invalid("x", 1, 0).is_incomplete());
    }

    #[test]
    fn test_traceback_format() {
        let exc = Exception::name_error("spam").at_line(3).at_line(1);
        assert_eq!(
            exc.traceback(),
            "Traceback (most recent call last):\n  File \"<input>\", line 3, in <module>\nNameError: name 'spam' is not defined\n"
        );
    }
}
