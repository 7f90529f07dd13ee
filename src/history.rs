//! Executed-unit history and last-word recall.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tracing::{debug, warn};

/// Default cap on stored entries.
pub const DEFAULT_HIST_LENGTH: usize = 1000;

/// Append-only log of executed units, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryLog {
    entries: Vec<String>,
    max_len: usize,
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new(DEFAULT_HIST_LENGTH)
    }
}

impl HistoryLog {
    pub fn new(max_len: usize) -> Self {
        HistoryLog {
            entries: Vec::new(),
            max_len,
        }
    }

    /// Record an executed unit. Blank units are skipped; the oldest entry is
    /// dropped once the log is full.
    pub fn append(&mut self, unit: &str) {
        let unit = unit.trim_end();
        if unit.trim().is_empty() || self.max_len == 0 {
            return;
        }
        if self.entries.len() >= self.max_len {
            self.entries.remove(0);
        }
        self.entries.push(unit.to_string());
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry `back` positions from the newest (0 = newest).
    pub fn from_end(&self, back: usize) -> Option<&str> {
        let idx = self.entries.len().checked_sub(back + 1)?;
        Some(&self.entries[idx])
    }

    /// Load a log written by [`HistoryLog::save`]. A missing file yields an
    /// empty log.
    pub fn load(path: &Path, max_len: usize) -> io::Result<Self> {
        let mut log = HistoryLog::new(max_len);
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(log),
            Err(e) => return Err(e),
        };
        for line in contents.lines() {
            log.append(&unescape(line));
        }
        debug!(path = %path.display(), entries = log.len(), "loaded history");
        Ok(log)
    }

    /// Write one entry per line, with embedded newlines escaped.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = fs::File::create(path)?;
        for entry in &self.entries {
            writeln!(file, "{}", escape(entry))?;
        }
        debug!(path = %path.display(), entries = self.len(), "saved history");
        Ok(())
    }
}

fn escape(entry: &str) -> String {
    entry.replace('\\', "\\\\").replace('\n', "\\n")
}

fn unescape(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                warn!(escape = %other, "unknown escape in history file");
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Last whitespace-delimited token of `text`.
pub fn last_word(text: &str) -> Option<&str> {
    text.split_whitespace().last()
}

/// Position of repeated last-word recall.
///
/// `Idle` until the first recall; afterwards remembers how far back the
/// previous word came from and what was inserted, so the next recall can
/// replace it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RecallCursor {
    #[default]
    Idle,
    Recalled { back: usize, inserted: String },
}

impl RecallCursor {
    pub fn reset(&mut self) {
        *self = RecallCursor::Idle;
    }

    /// Compute the new current line for one recall step, or `None` when the
    /// log has nothing to offer.
    pub fn recall(&mut self, log: &HistoryLog, line: &str) -> Option<String> {
        if log.is_empty() {
            return None;
        }
        let (back, base) = match self {
            RecallCursor::Idle => (0, line),
            RecallCursor::Recalled { back, inserted } => (
                (*back + 1).min(log.len() - 1),
                line.strip_suffix(inserted.as_str()).unwrap_or(line),
            ),
        };
        let word = log.from_end(back).and_then(last_word).unwrap_or("");
        let new_line = format!("{}{}", base, word);
        debug!(back, word, "recalled last word");
        *self = RecallCursor::Recalled {
            back,
            inserted: word.to_string(),
        };
        Some(new_line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_of(entries: &[&str]) -> HistoryLog {
        let mut log = HistoryLog::default();
        for entry in entries {
            log.append(entry);
        }
        log
    }

    #[test]
    fn test_recall_cycles_backward() {
        let log = log_of(&["1", "2 3", "4 5 6"]);
        let mut cursor = RecallCursor::default();
        let first = cursor.recall(&log, "abcde").unwrap();
        assert_eq!(first, "abcde6");
        let second = cursor.recall(&log, &first).unwrap();
        assert_eq!(second, "abcde3");
        let third = cursor.recall(&log, &second).unwrap();
        assert_eq!(third, "abcde1");
        assert_eq!(cursor.recall(&log, &third).unwrap(), "abcde1");
    }

    #[test]
    fn test_reset_starts_over() {
        let log = log_of(&["a b", "c d"]);
        let mut cursor = RecallCursor::default();
        let line = cursor.recall(&log, "x ").unwrap();
        cursor.reset();
        assert_eq!(cursor.recall(&log, &line).unwrap(), "x dd");
    }

    #[test]
    fn test_recall_empty_log() {
        let mut cursor = RecallCursor::default();
        assert_eq!(cursor.recall(&HistoryLog::default(), "x"), None);
        assert_eq!(cursor, RecallCursor::Idle);
    }

    #[test]
    fn test_blank_units_not_recorded() {
        let log = log_of(&["", "   ", "x = 1\n"]);
        assert_eq!(log.entries(), &["x = 1".to_string()]);
    }

    #[test]
    fn test_cap_drops_oldest() {
        let mut log = HistoryLog::new(2);
        log.append("a");
        log.append("b");
        log.append("c");
        assert_eq!(log.entries(), &["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_save_and_load_multiline_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history");
        let log = log_of(&["def f():\n    return 1", "print('a\\\\b')"]);
        log.save(&path).unwrap();
        let loaded = HistoryLog::load(&path, 10).unwrap();
        assert_eq!(loaded, HistoryLog { entries: log.entries.clone(), max_len: 10 });
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::load(&dir.path().join("nope"), 5).unwrap();
        assert!(log.is_empty());
    }
}
