use std::path::{Path, PathBuf};

use super::types::{
    DEFAULT_ALGORITHM, DEFAULT_COMMAND, DEFAULT_CONCURRENCY, DEFAULT_HOST, DEFAULT_PORT,
    DEFAULT_SHUTDOWN_GRACE_MS, EvaluationSection, OptiglotConfig, OptimizerSection,
    RawEvaluationSection, RawOptiglotConfig, RawOptimizerSection, RawServerSection,
    RawSessionSection, ServerSection, SessionSection,
};

/// Environment variable overriding the project config directory
pub const PROJECT_CONFIG_DIR_ENV: &str = "OPTIGLOT_PROJECT_CONFIG_DIR";

/// Errors from reading configuration files
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<OptiglotConfig, ConfigError> {
        let mut raw = RawOptiglotConfig::default();

        // Layer 1: User config
        let user_path = Self::user_config_path();
        if user_path.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(&user_path)?);
        }

        // Layer 2: Project config
        let project_path = Self::project_config_path();
        if project_path.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(&project_path)?);
        }

        Ok(Self::finalize(raw))
    }

    /// Load a single file, applying defaults for anything it leaves out
    pub fn load_from_path(path: &Path) -> Result<OptiglotConfig, ConfigError> {
        Ok(Self::finalize(Self::read_raw(path)?))
    }

    /// `$XDG_CONFIG_HOME/optiglot/config.toml`
    pub fn user_config_path() -> PathBuf {
        optiglot_paths::config_dir().join("config.toml")
    }

    /// Get project config path
    /// Can be overridden with OPTIGLOT_PROJECT_CONFIG_DIR (useful for isolated tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var(PROJECT_CONFIG_DIR_ENV) {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".optiglot/config.toml")
        }
    }

    /// Render the effective configuration as TOML
    pub fn render(config: &OptiglotConfig) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(config)?)
    }

    fn read_raw(path: &Path) -> Result<RawOptiglotConfig, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawOptiglotConfig, overlay: RawOptiglotConfig) -> RawOptiglotConfig {
        let mut options = base.options;
        options.extend(overlay.options);

        RawOptiglotConfig {
            algorithm: overlay.algorithm.or(base.algorithm),
            server: RawServerSection {
                host: overlay.server.host.or(base.server.host),
                port: overlay.server.port.or(base.server.port),
            },
            optimizer: RawOptimizerSection {
                command: overlay.optimizer.command.or(base.optimizer.command),
                args: overlay.optimizer.args.or(base.optimizer.args),
            },
            evaluation: RawEvaluationSection {
                concurrency: overlay.evaluation.concurrency.or(base.evaluation.concurrency),
            },
            session: RawSessionSection {
                work_dir: overlay.session.work_dir.or(base.session.work_dir),
                keep_artifacts: overlay.session.keep_artifacts.or(base.session.keep_artifacts),
                timeout_secs: overlay.session.timeout_secs.or(base.session.timeout_secs),
                shutdown_grace_ms: overlay
                    .session
                    .shutdown_grace_ms
                    .or(base.session.shutdown_grace_ms),
            },
            options,
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawOptiglotConfig) -> OptiglotConfig {
        // An explicit command without args means "no args", not the default module.
        let args = match (&raw.optimizer.command, raw.optimizer.args) {
            (_, Some(args)) => args,
            (Some(_), None) => Vec::new(),
            (None, None) => OptimizerSection::default().args,
        };

        OptiglotConfig {
            algorithm: raw.algorithm.unwrap_or_else(|| DEFAULT_ALGORITHM.to_string()),
            server: ServerSection {
                host: raw.server.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: raw.server.port.unwrap_or(DEFAULT_PORT),
            },
            optimizer: OptimizerSection {
                command: raw
                    .optimizer
                    .command
                    .unwrap_or_else(|| DEFAULT_COMMAND.to_string()),
                args,
            },
            evaluation: EvaluationSection {
                concurrency: raw
                    .evaluation
                    .concurrency
                    .unwrap_or(DEFAULT_CONCURRENCY)
                    .max(1),
            },
            session: SessionSection {
                work_dir: raw.session.work_dir,
                keep_artifacts: raw.session.keep_artifacts.unwrap_or(false),
                timeout_secs: raw.session.timeout_secs,
                shutdown_grace_ms: raw
                    .session
                    .shutdown_grace_ms
                    .unwrap_or(DEFAULT_SHUTDOWN_GRACE_MS),
            },
            options: raw.options,
        }
    }
}
