use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Cmd, ConditionalEventHandler, Context, Event, EventContext, Helper, Movement, RepeatCount, Result};

use crate::history::{HistoryLog, RecallCursor};
use crate::tokenizer::{self, TokenClass, KEYWORDS};

/// The rustyline helper for snek.
///
/// Combines syntax highlighting and tab-completion of top-level names and
/// keywords. Continuation lines are driven by the session, so input is
/// always accepted as-is.
pub struct SnekHelper {
    /// Names bound in the session, synced before each readline.
    pub names: BTreeSet<String>,
    color: bool,
}

impl Default for SnekHelper {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SnekHelper {
    pub fn new(color: bool) -> Self {
        SnekHelper {
            names: BTreeSet::new(),
            color,
        }
    }

    pub fn update_names(&mut self, names: impl IntoIterator<Item = String>) {
        self.names.clear();
        self.names.extend(names);
    }
}

impl Helper for SnekHelper {}

// ========== Highlighter ==========

/// ANSI color codes.
const YELLOW: &str = "\x1b[33m";
const MAGENTA: &str = "\x1b[35m";
const CYAN: &str = "\x1b[36m";
const GREEN: &str = "\x1b[32m";
const GREY: &str = "\x1b[90m";
const RESET: &str = "\x1b[0m";

fn color_of(class: TokenClass, text: &str, names: &BTreeSet<String>) -> Option<&'static str> {
    match class {
        TokenClass::Str => Some(YELLOW),
        TokenClass::Keyword => Some(MAGENTA),
        TokenClass::Number => Some(CYAN),
        TokenClass::Comment => Some(GREY),
        TokenClass::Name if names.contains(text) => Some(GREEN),
        TokenClass::Name | TokenClass::Op => None,
    }
}

impl Highlighter for SnekHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if !self.color || line.is_empty() {
            return Cow::Borrowed(line);
        }

        let tokens = tokenizer::tokenize_with_positions(line);
        let mut result = String::with_capacity(line.len() + tokens.len() * 10);
        let mut last_end = 0;

        for tok in &tokens {
            let start = tok.position;
            let end = start + tok.text.len();
            result.push_str(&line[last_end..start]);
            match color_of(tok.class, &tok.text, &self.names) {
                Some(color) => {
                    result.push_str(color);
                    result.push_str(&tok.text);
                    result.push_str(RESET);
                }
                None => result.push_str(&tok.text),
            }
            last_end = end;
        }
        result.push_str(&line[last_end..]);

        Cow::Owned(result)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        self.color
    }

    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(&'s self, prompt: &'p str, _default: bool) -> Cow<'b, str> {
        Cow::Borrowed(prompt)
    }
}

impl Validator for SnekHelper {}

// ========== Completer ==========

impl Completer for SnekHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Result<(usize, Vec<Pair>)> {
        let (word_start, word) = find_word_at(line, pos);
        if word.is_empty() {
            return Ok((pos, Vec::new()));
        }

        let mut completions: Vec<Pair> = KEYWORDS
            .iter()
            .copied()
            .chain(self.names.iter().map(String::as_str))
            .filter(|candidate| candidate.starts_with(word))
            .map(|candidate| Pair {
                display: candidate.to_string(),
                replacement: candidate.to_string(),
            })
            .collect();
        completions.sort_by(|a, b| a.display.cmp(&b.display));
        completions.dedup_by(|a, b| a.display == b.display);

        Ok((word_start, completions))
    }
}

/// Find the identifier being typed at the cursor position.
/// Returns (start_position, word_slice).
fn find_word_at(line: &str, pos: usize) -> (usize, &str) {
    let start = line[..pos]
        .char_indices()
        .rev()
        .take_while(|&(_, c)| c.is_alphanumeric() || c == '_')
        .last()
        .map_or(pos, |(i, _)| i);
    (start, &line[start..pos])
}

// ========== Hinter (no-op) ==========

impl Hinter for SnekHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<String> {
        None
    }
}

// ========== Last-word recall ==========

#[derive(Debug, Default)]
struct RecallState {
    log: HistoryLog,
    cursor: RecallCursor,
    /// Line produced by the previous recall; any other line means the user
    /// edited in between.
    produced: Option<String>,
}

/// Alt-. handler: appends the last word of earlier history entries to the
/// line, stepping further back on each press.
#[derive(Debug, Clone, Default)]
pub struct LastWordHandler {
    state: Arc<Mutex<RecallState>>,
}

impl LastWordHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the history snapshot; called before each readline.
    pub fn refresh(&self, log: &HistoryLog) {
        if let Ok(mut state) = self.state.lock() {
            state.log = log.clone();
            state.cursor.reset();
            state.produced = None;
        }
    }

    fn recall(&self, line: &str) -> Option<String> {
        let mut guard = self.state.lock().ok()?;
        let RecallState { log, cursor, produced } = &mut *guard;
        if produced.as_deref() != Some(line) {
            cursor.reset();
        }
        let new_line = cursor.recall(log, line)?;
        *produced = Some(new_line.clone());
        Some(new_line)
    }
}

impl ConditionalEventHandler for LastWordHandler {
    fn handle(&self, _evt: &Event, _n: RepeatCount, _positive: bool, ctx: &EventContext) -> Option<Cmd> {
        self.recall(ctx.line())
            .map(|line| Cmd::Replace(Movement::WholeLine, Some(line)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_colors_keywords_and_strings() {
        let helper = SnekHelper::new(true);
        let out = helper.highlight("def f(): return 'x' # done", 0);
        assert!(out.contains(&format!("{MAGENTA}def{RESET}")));
        assert!(out.contains(&format!("{YELLOW}'x'{RESET}")));
        assert!(out.contains(&format!("{GREY}# done{RESET}")));
    }

    #[test]
    fn test_highlight_disabled() {
        let helper = SnekHelper::new(false);
        assert!(matches!(helper.highlight("x = 1", 0), Cow::Borrowed("x = 1")));
    }

    #[test]
    fn test_highlight_keeps_text() {
        let mut helper = SnekHelper::new(true);
        helper.update_names(["foo".to_string()]);
        let line = "foo(1,  \"åß\")";
        let stripped = helper
            .highlight(line, 0)
            .replace(YELLOW, "")
            .replace(CYAN, "")
            .replace(GREEN, "")
            .replace(RESET, "");
        assert_eq!(stripped, line);
    }

    #[test]
    fn test_find_word_at() {
        assert_eq!(find_word_at("print(pri", 9), (6, "pri"));
        assert_eq!(find_word_at("x.ap", 4), (2, "ap"));
        assert_eq!(find_word_at("a ", 2), (2, ""));
    }

    #[test]
    fn test_last_word_handler_steps_back() {
        let mut log = HistoryLog::default();
        for entry in ["1", "2 3", "4 5 6"] {
            log.append(entry);
        }
        let handler = LastWordHandler::new();
        handler.refresh(&log);
        let first = handler.recall("abcde").unwrap();
        assert_eq!(first, "abcde6");
        assert_eq!(handler.recall(&first).unwrap(), "abcde3");
        // an edited line starts over from the newest entry
        assert_eq!(handler.recall("xyz ").unwrap(), "xyz 6");
    }
}
