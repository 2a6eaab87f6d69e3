//! Session configuration, layered from user and project TOML files

mod loader;
mod types;

pub use loader::{ConfigError, ConfigLoader, PROJECT_CONFIG_DIR_ENV};
pub use types::{
    DEFAULT_ALGORITHM, DEFAULT_CONCURRENCY, DEFAULT_HOST, DEFAULT_PORT, EvaluationSection,
    OptiglotConfig, OptimizerSection, RawOptiglotConfig, ServerSection, SessionSection,
};
