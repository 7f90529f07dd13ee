/// Lines of the unit being entered plus the line under edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineBuffer {
    lines: Vec<String>,
    current: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a committed line. Trailing newlines are not part of a line.
    pub fn push_line(&mut self, line: &str) {
        self.lines.push(line.trim_end_matches(['\n', '\r']).to_string());
    }

    /// Remove the last committed line (undo).
    pub fn pop_line(&mut self) -> Option<String> {
        self.lines.pop()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Committed lines joined with newlines.
    pub fn joined(&self) -> String {
        self.lines.join("\n")
    }

    pub fn current_line(&self) -> &str {
        &self.current
    }

    pub fn set_current_line(&mut self, text: &str) {
        self.current = text.to_string();
    }

    /// Committed lines followed by the current line.
    pub fn current_block(&self) -> String {
        let mut block = self.lines.clone();
        block.push(self.current.clone());
        block.join("\n")
    }

    /// Clear committed lines; the current line is kept.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }
}
