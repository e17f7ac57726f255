//! SQLite configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{SqliteError, SqliteResult};

/// SQLite database configuration.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database path (or ":memory:" for in-memory).
    pub path: DatabasePath,
    /// Enable foreign keys.
    pub foreign_keys: bool,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: Option<u32>,
    /// Journal mode, applied to file databases only.
    pub journal_mode: JournalMode,
}

/// Database path configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DatabasePath {
    /// In-memory database.
    #[default]
    Memory,
    /// File-based database.
    File(PathBuf),
}

impl DatabasePath {
    /// Check if this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JournalMode {
    /// Delete the journal after each transaction.
    Delete,
    /// Truncate the journal instead of deleting it.
    Truncate,
    /// Write-ahead logging.
    #[default]
    Wal,
    /// Keep the journal in memory.
    Memory,
}

impl JournalMode {
    /// Get the SQLite pragma value.
    pub fn as_pragma(&self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
            Self::Wal => "WAL",
            Self::Memory => "MEMORY",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "delete" => Some(Self::Delete),
            "truncate" => Some(Self::Truncate),
            "wal" => Some(Self::Wal),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: DatabasePath::Memory,
            foreign_keys: true,
            busy_timeout_ms: Some(5000),
            journal_mode: JournalMode::Wal,
        }
    }
}

impl SqliteConfig {
    /// Configuration for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Configuration for a file-based database.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            path: DatabasePath::File(path.as_ref().to_path_buf()),
            ..Default::default()
        }
    }

    /// Parse a SQLite URL.
    ///
    /// Supported formats:
    /// - `sqlite::memory:` or `:memory:`
    /// - `sqlite://path/to/db.sqlite`
    /// - `sqlite:path/to/db.sqlite`
    /// - `file:path/to/db.sqlite`
    ///
    /// Query parameters: `foreign_keys`, `busy_timeout`, `journal_mode`
    /// and `mode=memory`.
    pub fn from_url(url: impl AsRef<str>) -> SqliteResult<Self> {
        let url = url.as_ref().trim();
        let (location, query) = match url.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (url, None),
        };

        let path = location
            .strip_prefix("sqlite://")
            .or_else(|| location.strip_prefix("sqlite:"))
            .or_else(|| location.strip_prefix("file:"))
            .unwrap_or(location);

        let mut config = match path {
            "" => return Err(SqliteError::config("database path is required")),
            ":memory:" => Self::memory(),
            path => Self::file(path),
        };

        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            match key {
                "mode" if value == "memory" => config.path = DatabasePath::Memory,
                "foreign_keys" => config.foreign_keys = value == "true" || value == "1",
                "busy_timeout" => {
                    let ms = value.parse().map_err(|_| {
                        SqliteError::config(format!("invalid busy_timeout '{}'", value))
                    })?;
                    config.busy_timeout_ms = Some(ms);
                }
                "journal_mode" => {
                    config.journal_mode = JournalMode::parse(value).ok_or_else(|| {
                        SqliteError::config(format!("unknown journal_mode '{}'", value))
                    })?;
                }
                _ => {}
            }
        }

        Ok(config)
    }

    /// Set the busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = Some(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
        self
    }

    /// Enable or disable foreign key enforcement.
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Set the journal mode.
    pub fn journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_memory_urls() {
        for url in ["sqlite::memory:", ":memory:", "sqlite://:memory:", "file:db?mode=memory"] {
            let config = SqliteConfig::from_url(url).unwrap();
            assert!(config.path.is_memory(), "{url}");
        }
    }

    #[test]
    fn test_file_urls() {
        let config = SqliteConfig::from_url("sqlite://./data/app.db").unwrap();
        assert_eq!(config.path, DatabasePath::File(PathBuf::from("./data/app.db")));

        let config = SqliteConfig::from_url("file:/tmp/app.db").unwrap();
        assert_eq!(config.path, DatabasePath::File(PathBuf::from("/tmp/app.db")));

        let config = SqliteConfig::from_url("app.db").unwrap();
        assert_eq!(config.path, DatabasePath::File(PathBuf::from("app.db")));
    }

    #[test]
    fn test_query_parameters() {
        let config = SqliteConfig::from_url(
            "sqlite://app.db?foreign_keys=0&busy_timeout=250&journal_mode=truncate",
        )
        .unwrap();
        assert!(!config.foreign_keys);
        assert_eq!(config.busy_timeout_ms, Some(250));
        assert_eq!(config.journal_mode, JournalMode::Truncate);
    }

    #[test]
    fn test_invalid_urls() {
        assert!(SqliteConfig::from_url("sqlite://").is_err());
        assert!(SqliteConfig::from_url("sqlite://a.db?busy_timeout=soon").is_err());
        assert!(SqliteConfig::from_url("sqlite://a.db?journal_mode=fast").is_err());
    }

    #[test]
    fn test_builders() {
        let config = SqliteConfig::memory()
            .busy_timeout(Duration::from_secs(2))
            .foreign_keys(false)
            .journal_mode(JournalMode::Delete);
        assert_eq!(config.busy_timeout_ms, Some(2000));
        assert!(!config.foreign_keys);
        assert_eq!(config.journal_mode.as_pragma(), "DELETE");
    }
}
