//! Indentation prediction for continuation lines.

use tracing::trace;

/// Statements after which the block they end is usually finished.
const DEDENT_KEYWORDS: &[&str] = &["return", "pass", "raise", "yield", "break", "continue"];

/// Predict the indentation (in spaces) of the line following `line`.
///
/// Purely textual: the compiler is never consulted.
pub fn predicted_indent(line: &str, tab_length: usize) -> usize {
    let base = leading_width(line);
    let code = strip_comment(line).trim_end();
    let stripped = code.trim_start();

    let indent = if code.ends_with(':') {
        base + tab_length
    } else if !line.is_empty() && line.trim().is_empty() {
        base.saturating_sub(tab_length)
    } else if !code.contains(':') && DEDENT_KEYWORDS.iter().any(|kw| starts_with_word(stripped, kw)) {
        base.saturating_sub(tab_length)
    } else {
        base
    };
    trace!(?line, indent, "predicted indent");
    indent
}

/// Width of the leading whitespace; a tab advances to the next multiple of
/// eight, as in the tokenizer.
fn leading_width(line: &str) -> usize {
    let mut col = 0;
    for c in line.chars() {
        match c {
            ' ' => col += 1,
            '\t' => col = (col / 8 + 1) * 8,
            _ => break,
        }
    }
    col
}

fn starts_with_word(text: &str, word: &str) -> bool {
    text.strip_prefix(word)
        .is_some_and(|rest| !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_'))
}

/// Drop a trailing `#` comment, ignoring `#` inside string literals.
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (idx, c) in line.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => quote = Some(c),
                '#' => return &line[..idx],
                _ => {}
            },
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_header_indents() {
        assert_eq!(predicted_indent("def foo(x):", 4), 4);
        assert_eq!(predicted_indent("    if x:", 4), 8);
    }

    #[test]
    fn test_inline_suite_keeps_level() {
        assert_eq!(predicted_indent("class Foo: pass", 4), 0);
    }

    #[test]
    fn test_plain_statement_keeps_level() {
        assert_eq!(predicted_indent("    x = 1", 4), 4);
        assert_eq!(predicted_indent("", 4), 0);
    }

    #[test]
    fn test_blank_line_dedents() {
        assert_eq!(predicted_indent("        ", 4), 4);
        assert_eq!(predicted_indent("  ", 4), 0);
    }

    #[test]
    fn test_return_dedents() {
        assert_eq!(predicted_indent("    return 1", 4), 0);
        assert_eq!(predicted_indent("        pass", 4), 4);
        assert_eq!(predicted_indent("    break", 4), 0);
    }

    #[test]
    fn test_keyword_prefix_of_name_does_not_dedent() {
        assert_eq!(predicted_indent("    passed = True", 4), 4);
        assert_eq!(predicted_indent("    returned()", 4), 4);
    }

    #[test]
    fn test_comment_after_colon() {
        assert_eq!(predicted_indent("if x:  # check", 4), 4);
        assert_eq!(predicted_indent("x = '#':", 4), 4);
    }

    #[test]
    fn test_tabs_advance_to_multiples_of_eight() {
        assert_eq!(predicted_indent("\tif x:", 4), 12);
        assert_eq!(predicted_indent("  \tx = 1", 4), 8);
        assert_eq!(predicted_indent("\t\treturn", 4), 12);
    }

    #[test]
    fn test_custom_tab_length() {
        assert_eq!(predicted_indent("while True:", 2), 2);
    }
}
