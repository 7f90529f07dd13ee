use tracing::{debug, trace};

use crate::probe::{probe, CompileOutcome};

/// What the console should do with the accumulated buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completeness {
    /// Ready to execute.
    Finished,
    /// Keep reading continuation lines.
    NeedsMore,
    /// Can never parse; discard and report.
    Rejected,
}

impl Completeness {
    /// The `(finished, will_parse)` pair.
    pub fn as_pair(self) -> (bool, bool) {
        match self {
            Completeness::Finished => (true, true),
            Completeness::NeedsMore => (false, true),
            Completeness::Rejected => (true, false),
        }
    }
}

/// Decide whether `text` is a complete statement, needs continuation lines,
/// or is hopeless.
///
/// An invalid text still counts as needing more input if adding an indented
/// `pass` one level below its last non-blank line makes it compile, which
/// covers a block header followed by a blank line. Two trailing blank lines
/// always finish the unit.
pub fn classify(text: &str) -> Completeness {
    let result = match probe(text) {
        CompileOutcome::Complete => Completeness::Finished,
        CompileOutcome::Incomplete => Completeness::NeedsMore,
        CompileOutcome::Invalid if ends_with_two_blank_lines(text) => Completeness::Rejected,
        CompileOutcome::Invalid => {
            let speculative = with_indented_pass(text);
            trace!(?speculative, "speculative probe");
            if probe(&speculative) == CompileOutcome::Invalid {
                Completeness::Rejected
            } else {
                Completeness::NeedsMore
            }
        }
    };
    debug!(?text, ?result, "classified buffer");
    result
}

/// `classify` as the `(finished, will_parse)` pair.
pub fn code_finished_will_parse(text: &str) -> (bool, bool) {
    classify(text).as_pair()
}

fn ends_with_two_blank_lines(text: &str) -> bool {
    let mut lines = text.rsplit('\n');
    match (lines.next(), lines.next(), lines.next()) {
        (Some(last), Some(prev), Some(_)) => last.trim().is_empty() && prev.trim().is_empty(),
        _ => false,
    }
}

fn with_indented_pass(text: &str) -> String {
    let indent = text
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches(' ').len())
        .unwrap_or(0);
    format!("{}\n{}pass", text, " ".repeat(indent + 4))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_expression_finished() {
        assert_eq!(classify("1 + 1"), Completeness::Finished);
        assert_eq!(code_finished_will_parse("1 + 1"), (true, true));
    }

    #[test]
    fn test_block_header_needs_more() {
        assert_eq!(code_finished_will_parse("def foo(x):"), (false, true));
    }

    #[test]
    fn test_inline_class_finished() {
        assert_eq!(code_finished_will_parse("class Foo: pass"), (true, true));
    }

    #[test]
    fn test_missing_colon_rejected() {
        assert_eq!(code_finished_will_parse("def foo(x)"), (true, false));
    }

    #[test]
    fn test_unindented_body_rejected() {
        assert_eq!(code_finished_will_parse("def foo(x):\nreturn 1"), (true, false));
    }

    #[test]
    fn test_open_block_needs_more() {
        assert_eq!(code_finished_will_parse("def foo(x):\n    return 1"), (false, true));
    }

    #[test]
    fn test_blank_line_finishes_block() {
        assert_eq!(code_finished_will_parse("def foo(x):\n    return 1\n"), (true, true));
    }

    #[test]
    fn test_header_then_blank_still_needs_more() {
        assert_eq!(classify("def foo(x):\n"), Completeness::NeedsMore);
    }

    #[test]
    fn test_two_blank_lines_force_finish() {
        assert_eq!(classify("def foo(x):\n\n"), Completeness::Rejected);
    }

    #[test]
    fn test_string_with_colon_is_not_a_header() {
        assert_eq!(classify("x = 'if y:'"), Completeness::Finished);
    }

    #[test]
    fn test_unterminated_string_rejected() {
        assert_eq!(classify("x = 'abc"), Completeness::Rejected);
    }

    #[test]
    fn test_nested_block_indent() {
        assert_eq!(classify("if x:\n    if y:"), Completeness::NeedsMore);
        assert_eq!(classify("if x:\n    if y:\n"), Completeness::NeedsMore);
    }

    #[test]
    fn test_empty_finished() {
        assert_eq!(classify(""), Completeness::Finished);
    }

    #[test]
    fn test_speculative_pass_indent() {
        assert_eq!(with_indented_pass("if x:\n    if y:\n"), "if x:\n    if y:\n\n        pass");
    }
}
