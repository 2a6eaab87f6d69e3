//! Handoff artifacts written for the optimizer process.
//!
//! The session writes `config.json` plus the dataset files into its work
//! directory and passes the config path to the optimizer with `--config`.

use std::path::{Path, PathBuf};

use optiglot_core::{Candidate, Example, ProgramSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::SessionError;

pub const CONFIG_FILE: &str = "config.json";
pub const DATASET_FILE: &str = "dataset.json";
pub const VALSET_FILE: &str = "valset.json";

/// Everything the optimizer needs to drive a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handoff {
    pub algorithm: String,
    pub dataset_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valset_path: Option<PathBuf>,
    /// Instructions the program started with
    pub seed_candidate: Candidate,
    /// Base URL of the evaluation server, e.g. `http://127.0.0.1:7433`
    pub callback_url: String,
    pub port: u16,
    #[serde(default)]
    pub options: Map<String, Value>,
    /// Predictor manifest: signatures, instructions, demos and model settings
    pub program: ProgramSnapshot,
}

impl Handoff {
    /// Write `config.json` into `dir`, returning its path
    pub fn write(&self, dir: &Path) -> Result<PathBuf, SessionError> {
        let path = dir.join(CONFIG_FILE);
        write_json(&path, self)?;
        Ok(path)
    }

    pub fn read(path: &Path) -> Result<Self, SessionError> {
        read_json(path)
    }
}

/// Write a dataset as a JSON array of examples
pub fn write_dataset(path: &Path, examples: &[Example]) -> Result<(), SessionError> {
    write_json(path, examples)
}

pub fn read_dataset(path: &Path) -> Result<Vec<Example>, SessionError> {
    read_json(path)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), SessionError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| artifact_error(path, e))?;
    std::fs::write(path, json).map_err(|e| artifact_error(path, e))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, SessionError> {
    let contents = std::fs::read_to_string(path).map_err(|e| artifact_error(path, e))?;
    serde_json::from_str(&contents).map_err(|e| artifact_error(path, e))
}

fn artifact_error(path: &Path, error: impl std::fmt::Display) -> SessionError {
    SessionError::Artifact {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}
