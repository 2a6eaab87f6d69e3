//! Session error types

use std::path::PathBuf;
use std::time::Duration;

use optiglot_paths::PathsError;
use optiglot_server::ServerError;
use thiserror::Error;

use crate::config::ConfigError;

/// Fatal errors that end an optimization session
#[derive(Debug, Error)]
pub enum SessionError {
    /// The evaluation server could not start or stop cleanly
    #[error("evaluation server error: {0}")]
    Server(#[from] ServerError),

    /// The session work directory could not be created
    #[error(transparent)]
    WorkDir(#[from] PathsError),

    /// Handoff artifacts could not be written
    #[error("failed to write session artifact {path}: {message}")]
    Artifact { path: PathBuf, message: String },

    /// The optimizer process could not be started
    #[error("failed to spawn optimizer '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The optimizer exited with a failure status before finalizing
    #[error("optimizer exited with {} before finalizing", describe_exit(.code))]
    ProcessFailed { code: Option<i32> },

    /// The optimizer exited cleanly without ever calling finalize
    #[error("optimizer exited without finalizing")]
    ExitedWithoutResult,

    /// The optimizer did not finalize within the configured timeout
    #[error("optimizer did not finalize within {0:?}")]
    TimedOut(Duration),

    /// Waiting on the optimizer process failed
    #[error("failed to wait for optimizer: {0}")]
    Wait(#[source] std::io::Error),

    /// `compile` was called on a session that already ran
    #[error("session already started")]
    AlreadyStarted,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_failed_names_exit_code() {
        let error = SessionError::ProcessFailed { code: Some(3) };
        assert_eq!(error.to_string(), "optimizer exited with status 3 before finalizing");
    }

    #[test]
    fn process_killed_by_signal_is_described() {
        let error = SessionError::ProcessFailed { code: None };
        assert!(error.to_string().contains("a signal"));
    }

    #[test]
    fn spawn_failed_names_command() {
        let error = SessionError::SpawnFailed {
            command: "missing-optimizer".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(error.to_string().contains("missing-optimizer"));
    }
}
