//! Logging setup for Charcoal.
//!
//! Library code logs through `tracing`; nothing is printed unless the
//! application installs a subscriber. With the `tracing-subscriber`
//! feature, [`init`] installs one configured from the environment:
//!
//! - `CHARCOAL_DEBUG=true|1|yes` enables debug logging
//! - `CHARCOAL_LOG_LEVEL=trace|debug|info|warn|error` sets the level
//! - `CHARCOAL_LOG_FORMAT=json|pretty|compact` sets the format (default `json`)
//!
//! ```rust,no_run
//! charcoal_query::logging::init();
//! ```
//!
//! Statements are logged at `debug` under the `charcoal_query` target, slow
//! queries at `warn`.

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Multi-line human readable output.
    Pretty,
    /// Single-line human readable output.
    Compact,
}

/// Logging settings resolved from `CHARCOAL_*` variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// `CHARCOAL_DEBUG` was set to a truthy value.
    pub debug: bool,
    /// Explicit `CHARCOAL_LOG_LEVEL`, if valid.
    pub level: Option<&'static str>,
    /// Output format.
    pub format: LogFormat,
}

impl LogSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let debug = lookup("CHARCOAL_DEBUG")
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);

        let level = lookup("CHARCOAL_LOG_LEVEL").and_then(|level| {
            match level.to_lowercase().as_str() {
                "trace" => Some("trace"),
                "debug" => Some("debug"),
                "info" => Some("info"),
                "warn" => Some("warn"),
                "error" => Some("error"),
                _ => None,
            }
        });

        let format = match lookup("CHARCOAL_LOG_FORMAT")
            .map(|f| f.to_lowercase())
            .as_deref()
        {
            Some("pretty") => LogFormat::Pretty,
            Some("compact") => LogFormat::Compact,
            _ => LogFormat::Json,
        };

        Self {
            debug,
            level,
            format,
        }
    }

    /// Whether logging was requested at all.
    pub fn is_enabled(&self) -> bool {
        self.debug || self.level.is_some()
    }

    /// Effective level: the explicit level, else `debug` in debug mode, else `warn`.
    pub fn effective_level(&self) -> &'static str {
        match self.level {
            Some(level) => level,
            None if self.debug => "debug",
            None => "warn",
        }
    }
}

/// Whether `CHARCOAL_DEBUG` is enabled.
pub fn is_debug_enabled() -> bool {
    LogSettings::from_env().debug
}

/// Install a global subscriber from the environment. Later calls are no-ops.
pub fn init() {
    INIT.call_once(|| {
        let settings = LogSettings::from_env();
        if !settings.is_enabled() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = settings.effective_level();
            let filter = EnvFilter::try_new(format!(
                "charcoal={level},charcoal_query={level},charcoal_sqlite={level},charcoal_mysql={level}"
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            let registry = tracing_subscriber::registry().with(filter);
            let installed = match settings.format {
                LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
                LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
                LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
            };

            if installed.is_ok() {
                tracing::info!(level, format = ?settings.format, "Charcoal logging initialized");
            }
        }
    });
}
