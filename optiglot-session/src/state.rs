//! Session lifecycle states and events

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an optimization session is in its lifecycle.
///
/// The happy path is `Created → Listening → ConfigWritten → ProcessSpawned →
/// Running → Finalized → TornDown`. The failure states are terminal; `Failed`
/// covers anything that goes wrong before the optimizer is spawned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Created,
    /// Evaluation server is accepting requests
    Listening { port: u16 },
    /// Handoff artifact written
    ConfigWritten { path: PathBuf },
    /// Optimizer process started
    ProcessSpawned { pid: Option<u32> },
    /// Waiting for the optimizer while it drives evaluations
    Running,
    /// The optimizer delivered its result
    Finalized,
    /// Server stopped, process reaped, artifacts handled
    TornDown,
    /// The optimizer could not be started
    SpawnFailed { error: String },
    /// The optimizer exited with a failure status before finalizing
    ProcessFailed { code: Option<i32> },
    /// The optimizer exited cleanly without finalizing
    ExitedWithoutResult,
    /// The optimizer did not finalize in time
    TimedOut,
    /// Setup failed before the optimizer was spawned
    Failed { error: String },
}

impl SessionState {
    /// True once the session can no longer change state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::TornDown
                | SessionState::SpawnFailed { .. }
                | SessionState::ProcessFailed { .. }
                | SessionState::ExitedWithoutResult
                | SessionState::TimedOut
                | SessionState::Failed { .. }
        )
    }

    pub fn is_failure(&self) -> bool {
        self.is_terminal() && *self != SessionState::TornDown
    }
}

/// Events emitted by an optimization session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The session moved to a new state
    StateChanged {
        from: SessionState,
        to: SessionState,
        at: DateTime<Utc>,
    },
    /// Teardown finished
    TornDown {
        /// Work directory, if it was kept
        artifacts: Option<PathBuf>,
    },
}
