//! Configuration file parsing for `charcoal.toml`.
//!
//! ```rust
//! use charcoal_query::config::CharcoalConfig;
//! use charcoal_query::Dialect;
//!
//! let config: CharcoalConfig = r#"
//!     [database]
//!     provider = "sqlite"
//!     url = "sqlite::memory:"
//!
//!     [loader]
//!     num_per_page = 25
//! "#
//! .parse()
//! .unwrap();
//!
//! assert_eq!(config.database.provider, Dialect::Sqlite);
//! assert_eq!(config.loader.num_per_page, 25);
//! assert_eq!(config.loader.table_alias, "objTable");
//! ```

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{MemoryCache, SharedCache};
use crate::connection::Dialect;
use crate::error::{QueryError, QueryResult};
use crate::expression::DEFAULT_TABLE_ALIAS;

/// Environment variable checked first by [`CharcoalConfig::from_env`].
pub const DATABASE_URL_ENV: &str = "CHARCOAL_DATABASE_URL";

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CharcoalConfig {
    /// Database connection.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Collection loader defaults.
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Row cache.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Query logging.
    #[serde(default)]
    pub debug: DebugConfig,
}

impl CharcoalConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> QueryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            QueryError::configuration(format!("cannot read {}: {}", path.display(), e))
                .with_source(e)
        })?;
        content.parse()
    }

    /// Build a configuration from `CHARCOAL_DATABASE_URL`, falling back to `DATABASE_URL`.
    ///
    /// The provider is taken from the URL scheme.
    pub fn from_env() -> QueryResult<Self> {
        let url = std::env::var(DATABASE_URL_ENV)
            .or_else(|_| std::env::var("DATABASE_URL"))
            .map_err(|_| {
                QueryError::configuration("no database URL in the environment")
                    .with_suggestion(format!("Set {} or DATABASE_URL", DATABASE_URL_ENV))
            })?;

        let provider = DatabaseConfig::provider_from_url(&url)?;
        Ok(Self {
            database: DatabaseConfig {
                provider,
                url: Some(url),
            },
            ..Self::default()
        })
    }

    /// The database URL.
    pub fn database_url(&self) -> Option<&str> {
        self.database.url.as_deref()
    }
}

impl FromStr for CharcoalConfig {
    type Err = QueryError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let expanded = expand_env_vars(content);
        toml::from_str(&expanded).map_err(|e| {
            QueryError::configuration(format!("invalid configuration: {}", e)).with_source(e)
        })
    }
}

/// Database configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database provider.
    #[serde(default = "default_provider")]
    pub provider: Dialect,

    /// Connection URL (supports `${ENV_VAR}` interpolation).
    pub url: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            url: None,
        }
    }
}

fn default_provider() -> Dialect {
    Dialect::Mysql
}

impl DatabaseConfig {
    /// Infer the provider from a URL scheme.
    pub fn provider_from_url(url: &str) -> QueryResult<Dialect> {
        let scheme = url.split(':').next().unwrap_or_default().to_lowercase();
        match scheme.as_str() {
            "mysql" | "mariadb" => Ok(Dialect::Mysql),
            "sqlite" | "file" => Ok(Dialect::Sqlite),
            _ => Err(QueryError::configuration(format!(
                "unsupported database URL scheme '{}'",
                scheme
            ))),
        }
    }
}

/// Collection loader defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderConfig {
    /// Alias of the primary table.
    #[serde(default = "default_table_alias")]
    pub table_alias: String,

    /// Default rows per page; 0 means unlimited.
    #[serde(default)]
    pub num_per_page: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            table_alias: default_table_alias(),
            num_per_page: 0,
        }
    }
}

fn default_table_alias() -> String {
    DEFAULT_TABLE_ALIAS.to_string()
}

/// Row cache configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Whether loaders cache rows.
    #[serde(default)]
    pub enabled: bool,

    /// Entry lifetime in seconds; 0 disables expiry.
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,

    /// Maximum number of entries.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_secs: default_ttl(),
            max_entries: default_max_entries(),
        }
    }
}

impl CacheConfig {
    /// Entry lifetime.
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }

    /// A new memory cache with these settings, `None` when disabled.
    pub fn build(&self) -> Option<SharedCache> {
        self.enabled
            .then(|| Arc::new(MemoryCache::new(self.max_entries, self.ttl())) as SharedCache)
    }
}

fn default_ttl() -> u64 {
    300
}

fn default_max_entries() -> usize {
    1000
}

/// Debug/logging configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugConfig {
    /// Log every statement at info level.
    #[serde(default)]
    pub log_queries: bool,

    /// Slow query threshold in milliseconds.
    #[serde(default = "default_slow_query_threshold")]
    pub slow_query_threshold: u64,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_queries: false,
            slow_query_threshold: default_slow_query_threshold(),
        }
    }
}

impl DebugConfig {
    /// Slow query threshold.
    pub fn slow_query_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_query_threshold)
    }
}

fn default_slow_query_threshold() -> u64 {
    1000
}

/// Replace `${VAR}` with the value of `VAR`. Unset variables are left as is.
fn expand_env_vars(content: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([^}]+)\}") else {
        return content.to_string();
    };

    re.replace_all(content, |caps: &regex_lite::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CharcoalConfig::default();
        assert_eq!(config.database.provider, Dialect::Mysql);
        assert_eq!(config.loader.table_alias, DEFAULT_TABLE_ALIAS);
        assert!(!config.cache.enabled);
        assert_eq!(config.debug.slow_query_threshold, 1000);
    }

    #[test]
    fn test_parse_full_config() {
        let config: CharcoalConfig = r#"
            [database]
            provider = "mysql"
            url = "mysql://root@localhost/charcoal"

            [loader]
            table_alias = "t"
            num_per_page = 50

            [cache]
            enabled = true
            ttl_secs = 0
            max_entries = 10

            [debug]
            log_queries = true
            slow_query_threshold = 250
        "#
        .parse()
        .unwrap();

        assert_eq!(config.database_url(), Some("mysql://root@localhost/charcoal"));
        assert_eq!(config.loader.table_alias, "t");
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl(), None);
        assert_eq!(config.debug.slow_query_threshold(), Duration::from_millis(250));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = "[loader]\nper_page = 3".parse::<CharcoalConfig>().unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_env_var_expansion() {
        // SAFETY: test-local variable name.
        unsafe { std::env::set_var("CHARCOAL_TEST_DB_URL", "sqlite::memory:") };
        let config: CharcoalConfig = r#"
            [database]
            provider = "sqlite"
            url = "${CHARCOAL_TEST_DB_URL}"
        "#
        .parse()
        .unwrap();
        assert_eq!(config.database_url(), Some("sqlite::memory:"));
    }

    #[test]
    fn test_unset_env_var_left_alone() {
        let expanded = expand_env_vars("url = \"${CHARCOAL_SURELY_UNSET_VAR}\"");
        assert_eq!(expanded, "url = \"${CHARCOAL_SURELY_UNSET_VAR}\"");
    }

    #[test]
    fn test_provider_from_url() {
        assert_eq!(
            DatabaseConfig::provider_from_url("mysql://u:p@h/db").unwrap(),
            Dialect::Mysql
        );
        assert_eq!(
            DatabaseConfig::provider_from_url("sqlite::memory:").unwrap(),
            Dialect::Sqlite
        );
        assert!(DatabaseConfig::provider_from_url("postgres://x").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("charcoal.toml");
        std::fs::write(&path, "[cache]\nenabled = true\n").unwrap();

        let config = CharcoalConfig::from_file(&path).unwrap();
        assert!(config.cache.enabled);
        assert!(CharcoalConfig::from_file(dir.path().join("missing.toml")).is_err());
    }
}
