//! Handing text to an external editor and reading it back.

use std::fs;
use std::io::Write;
use std::process::Command;

use tracing::debug;

use crate::error::EditorError;

/// Something that lets the user rewrite a block of text.
pub trait ExternalEditor {
    fn edit(&mut self, initial: &str) -> Result<String, EditorError>;
}

/// Runs an editor program on a temporary `.py` file.
#[derive(Debug, Clone)]
pub struct CommandEditor {
    command: String,
}

impl CommandEditor {
    pub fn new(command: impl Into<String>) -> Self {
        CommandEditor {
            command: command.into(),
        }
    }

    /// Editor from `$VISUAL` or `$EDITOR`.
    pub fn from_env() -> Option<Self> {
        ["VISUAL", "EDITOR"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.trim().is_empty())
            .map(CommandEditor::new)
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl ExternalEditor for CommandEditor {
    fn edit(&mut self, initial: &str) -> Result<String, EditorError> {
        let argv = split_command(&self.command);
        let (program, args) = argv.split_first().ok_or(EditorError::NotConfigured)?;

        let mut file = tempfile::Builder::new()
            .prefix("snek")
            .suffix(".py")
            .tempfile()?;
        file.write_all(initial.as_bytes())?;
        file.flush()?;

        debug!(command = %self.command, path = %file.path().display(), "launching editor");
        let status = Command::new(program)
            .args(args)
            .arg(file.path())
            .status()
            .map_err(|source| EditorError::Spawn {
                command: self.command.clone(),
                source,
            })?;
        if !status.success() {
            return Err(EditorError::ExitStatus {
                command: self.command.clone(),
                status: status.to_string(),
            });
        }

        let bytes = fs::read(file.path())?;
        Ok(String::from_utf8(bytes)?)
    }
}

/// Split a command line into words, honouring single and double quotes and
/// backslash escapes. No shell is involved.
pub fn split_command(command: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') | (None, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_word = true;
            }
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}
