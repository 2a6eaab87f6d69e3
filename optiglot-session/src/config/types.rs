use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default optimization algorithm named in the handoff
pub const DEFAULT_ALGORITHM: &str = "gepa";
/// Default bind host for the evaluation server
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Port 0 lets the OS pick a free port
pub const DEFAULT_PORT: u16 = 0;
pub const DEFAULT_COMMAND: &str = "python";
pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 2000;

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawOptiglotConfig {
    pub algorithm: Option<String>,

    #[serde(default)]
    pub server: RawServerSection,

    #[serde(default)]
    pub optimizer: RawOptimizerSection,

    #[serde(default)]
    pub evaluation: RawEvaluationSection,

    #[serde(default)]
    pub session: RawSessionSection,

    /// Free-form options passed through to the optimizer
    #[serde(default)]
    pub options: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawOptimizerSection {
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawEvaluationSection {
    pub concurrency: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSessionSection {
    pub work_dir: Option<PathBuf>,
    pub keep_artifacts: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub shutdown_grace_ms: Option<u64>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptiglotConfig {
    /// Algorithm the optimizer should run
    pub algorithm: String,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub optimizer: OptimizerSection,

    #[serde(default)]
    pub evaluation: EvaluationSection,

    #[serde(default)]
    pub session: SessionSection,

    #[serde(default)]
    pub options: Map<String, Value>,
}

impl Default for OptiglotConfig {
    fn default() -> Self {
        Self {
            algorithm: DEFAULT_ALGORITHM.to_string(),
            server: ServerSection::default(),
            optimizer: OptimizerSection::default(),
            evaluation: EvaluationSection::default(),
            session: SessionSection::default(),
            options: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// How to launch the external optimizer.
///
/// It is invoked as `<command> <args..> --port <port> --config <path>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerSection {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for OptimizerSection {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
            args: vec!["-m".to_string(), "optiglot".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationSection {
    /// Rollout workers per batch
    pub concurrency: usize,
}

impl Default for EvaluationSection {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSection {
    /// Where handoff artifacts are written; a fresh directory under the data dir if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
    pub keep_artifacts: bool,
    /// Give up on the optimizer after this long
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// How long the optimizer may take to exit on its own after the session ends
    pub shutdown_grace_ms: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            work_dir: None,
            keep_artifacts: false,
            timeout_secs: None,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
        }
    }
}

impl SessionSection {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
