//! Global subscriber installation.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines (default)
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Configuration for the global subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default directive when `RUST_LOG` is not set, e.g. `"info"` or `"optiglot_core=debug"`
    pub filter: String,
    pub format: LogFormat,
    /// Write to stderr so stdout stays free for command output
    pub stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Pretty,
            stderr: true,
        }
    }
}

impl LogConfig {
    /// Map a `-v` count onto a default filter: 0 = info, 1 = debug, 2+ = trace
    pub fn from_verbosity(verbose: u8) -> Self {
        let filter = match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        Self {
            filter: filter.to_string(),
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Filter from `RUST_LOG` if set and valid, otherwise from `self.filter`
    pub fn env_filter(&self) -> Result<EnvFilter, ObserveError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.filter).map_err(|e| ObserveError::InvalidFilter {
                filter: self.filter.clone(),
                message: e.to_string(),
            }),
        }
    }
}

/// Error type for subscriber initialization.
#[derive(Debug, thiserror::Error)]
pub enum ObserveError {
    #[error("invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },

    /// Failed to set global subscriber.
    #[error("failed to set global subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if the filter is invalid or a global subscriber has
/// already been set.
pub fn init_tracing(config: &LogConfig) -> Result<(), ObserveError> {
    let filter = config.env_filter()?;
    let registry = tracing_subscriber::registry().with(filter);

    match (config.format, config.stderr) {
        (LogFormat::Pretty, true) => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?,
        (LogFormat::Pretty, false) => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
        (LogFormat::Json, true) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
        (LogFormat::Json, false) => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
    }
    Ok(())
}
