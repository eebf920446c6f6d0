//! # Structured Logging
//!
//! The estimator emits `tracing` events (segment counts, crop, smoothing,
//! solver progress) but never installs a subscriber itself. Applications and
//! the bundled demos call [`init_logging`] once at startup.
//!
//! `RUST_LOG` takes precedence over the configured level unless an explicit
//! `filter` directive is set.
//!
//! ## Example
//!
//! ```rust,no_run
//! use nsd_core::logging::{init_logging, LogConfig, LogFormat, LogLevel};
//!
//! init_logging(&LogConfig {
//!     level: LogLevel::Debug,
//!     format: LogFormat::Compact,
//!     ..Default::default()
//! });
//! tracing::info!(bins = 1024, "estimating NSD");
//! ```

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, human-readable
    Pretty,
    /// One line per event
    #[default]
    Compact,
    /// Machine-readable
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Include source location (file:line)
    pub source_location: bool,
    pub thread_ids: bool,
    /// Explicit filter directive (e.g. "nsd_core=trace"), overrides `level`
    /// and `RUST_LOG`
    pub filter: Option<String>,
}

impl LogConfig {
    /// Verbose output with source locations.
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            format: LogFormat::Pretty,
            source_location: true,
            ..Default::default()
        }
    }

    /// Errors only.
    pub fn quiet() -> Self {
        Self {
            level: LogLevel::Error,
            ..Default::default()
        }
    }

    fn env_filter(&self) -> EnvFilter {
        match &self.filter {
            Some(custom) => EnvFilter::try_new(custom)
                .unwrap_or_else(|_| EnvFilter::new(self.level.to_string())),
            None => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.level.to_string())),
        }
    }
}

/// Install the global subscriber described by `config`.
///
/// Returns `false` when a global subscriber was already installed; the
/// existing one is kept.
pub fn init_logging(config: &LogConfig) -> bool {
    let filter = config.env_filter();
    let result = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_file(config.source_location)
                    .with_line_number(config.source_location)
                    .with_thread_ids(config.thread_ids),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_file(config.source_location)
                    .with_line_number(config.source_location)
                    .with_thread_ids(config.thread_ids),
            )
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .compact()
                    .with_file(config.source_location)
                    .with_line_number(config.source_location)
                    .with_thread_ids(config.thread_ids),
            )
            .try_init(),
    };
    result.is_ok()
}
