//! User configuration, read from `~/.config/snek/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::history::DEFAULT_HIST_LENGTH;
use crate::session::DEFAULT_TAB_LENGTH;

/// Version string for the console.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Settings for an interactive session. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Editor command for `:edit` and `:edit-session`; falls back to
    /// `$VISUAL` / `$EDITOR`.
    pub editor: Option<String>,
    pub tab_length: usize,
    /// Maximum number of history entries kept.
    pub hist_length: usize,
    /// History file; defaults to the data directory.
    pub hist_file: Option<PathBuf>,
    /// Syntax highlighting.
    pub color: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            editor: None,
            tab_length: DEFAULT_TAB_LENGTH,
            hist_length: DEFAULT_HIST_LENGTH,
            hist_file: None,
            color: true,
        }
    }
}

impl Config {
    /// Read `path`. A missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Config> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Config::default());
            }
            Err(e) => return Err(Error::Io(e)),
        };
        let config: Config = toml::from_str(&content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if config.tab_length == 0 {
            return Err(Error::Config {
                path: path.to_path_buf(),
                reason: "tab_length must be at least 1".to_string(),
            });
        }
        debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }

    /// The history file to use.
    pub fn history_path(&self) -> Option<PathBuf> {
        self.hist_file.clone().or_else(default_history_path)
    }
}

/// `~/.config/snek/config.toml` or the platform equivalent.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("snek").join("config.toml"))
}

/// `~/.local/share/snek/history` or the platform equivalent.
pub fn default_history_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("snek").join("history"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.tab_length, 4);
        assert!(config.color);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "editor = \"vim -n\"\nhist_length = 50").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.editor.as_deref(), Some("vim -n"));
        assert_eq!(config.hist_length, 50);
        assert_eq!(config.tab_length, DEFAULT_TAB_LENGTH);
    }

    #[test]
    fn test_explicit_history_file_wins() {
        let config = Config {
            hist_file: Some(PathBuf::from("/tmp/snek-history")),
            ..Config::default()
        };
        assert_eq!(config.history_path(), Some(PathBuf::from("/tmp/snek-history")));
    }

    #[test]
    fn test_bad_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tab_length = \"wide\"").unwrap();
        match Config::load(file.path()) {
            Err(Error::Config { path, .. }) => assert_eq!(path, file.path()),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_tab_length_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tab_length = 0").unwrap();
        assert!(matches!(Config::load(file.path()), Err(Error::Config { .. })));
    }
}
