use proptest::prelude::*;
use snek::indent::predicted_indent;
use snek::multiline::{classify, Completeness};
use snek::session::{PushOutcome, Session};

const MAX_INPUT_BYTES: usize = 160;

/// Source-like text: mostly the characters that matter to the tokenizer.
fn source_like() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            4 => proptest::sample::select(vec![
                "def f(x):", "if x:", "else:", "return x", "pass", "x = 1", "(", ")", "[", "]",
                "'", "\"", "\"\"\"", "#", "\\", ":", ",", " ", "    ", "\n", "\t", "x", "1",
            ])
            .prop_map(str::to_string),
            1 => any::<char>().prop_map(|c| c.to_string()),
        ],
        0..24,
    )
    .prop_map(|parts| parts.concat())
    .prop_filter("bounded input", |s| s.len() <= MAX_INPUT_BYTES)
}

/// Line-oriented text with nothing that can hold a unit open across lines:
/// no open brackets, quotes or backslashes.
fn bracket_free() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        proptest::sample::select(vec![
            "def f(x):", "if x:", "else:", "while x:", "return x", "pass", "x = 1", "y", ":",
            "#", " ", "    ", "\n", "\t", "=", "+",
        ]),
        0..16,
    )
    .prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn classify_never_panics_and_is_deterministic(text in source_like()) {
        let first = classify(&text);
        prop_assert_eq!(first, classify(&text));
    }

    #[test]
    fn classify_handles_lossy_utf8(bytes in proptest::collection::vec(any::<u8>(), 0..=MAX_INPUT_BYTES)) {
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let _ = classify(&text);
    }

    #[test]
    fn two_blank_lines_always_end_the_unit(text in bracket_free()) {
        let closed = format!("{}\n\n", text.trim_end());
        prop_assert_ne!(classify(&closed), Completeness::NeedsMore);
    }

    #[test]
    fn predicted_indent_stays_near_the_line(line in "[ a-z:#'()]{0,40}", tab in 1usize..9) {
        let base = line.len() - line.trim_start_matches(' ').len();
        let indent = predicted_indent(&line, tab);
        prop_assert!(indent <= base + tab);
        prop_assert!(indent + tab >= base);
    }

    #[test]
    fn session_buffer_empties_after_every_finished_unit(lines in proptest::collection::vec(source_like(), 1..6)) {
        let mut session = Session::new();
        for line in lines.iter().flat_map(|chunk| chunk.split('\n')) {
            match session.push(line) {
                Ok(PushOutcome::Executed(_)) | Err(_) => prop_assert!(session.buffer().is_empty()),
                Ok(PushOutcome::NeedsMore { .. }) => prop_assert!(!session.buffer().is_empty()),
            }
        }
    }
}
