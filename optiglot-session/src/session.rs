//! The optimization session: serve the protocol, run the optimizer, collect its result

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use optiglot_core::{Example, Metric, Program};
use optiglot_observe::{SessionId, TraceContext};
use optiglot_server::{
    EvalServer, EvalState, FinalizeReceiver, RunningServer, ServerConfig, ServerError,
    finalize_channel, http::FinalizeRequest,
};
use serde_json::Value;
use tokio::process::Child;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::OptiglotConfig;
use crate::handoff::{DATASET_FILE, Handoff, VALSET_FILE, write_dataset};
use crate::process::{reap, spawn_optimizer};
use crate::state::{SessionEvent, SessionState};
use crate::SessionError;

/// Everything that must be released when the session ends, however it ends
#[derive(Default)]
struct Resources {
    server: Option<RunningServer>,
    child: Option<Child>,
    work_dir: Option<PathBuf>,
}

/// One run of an external optimizer against a host program
pub struct OptimizationSession {
    id: Uuid,
    config: OptiglotConfig,
    valset: Option<Vec<Example>>,
    work_root: PathBuf,
    work_dir: PathBuf,
    started: AtomicBool,
    state: Arc<RwLock<SessionState>>,
    event_tx: broadcast::Sender<SessionEvent>,
    results: Mutex<Option<Value>>,
}

impl OptimizationSession {
    pub fn new(config: OptiglotConfig) -> Self {
        let id = Uuid::now_v7();
        let work_root = config
            .session
            .work_dir
            .clone()
            .unwrap_or_else(optiglot_paths::sessions_dir);
        let work_dir = work_root.join(id.to_string());
        let (event_tx, _) = broadcast::channel(64);
        Self {
            id,
            config,
            valset: None,
            work_root,
            work_dir,
            started: AtomicBool::new(false),
            state: Arc::new(RwLock::new(SessionState::Created)),
            event_tx,
            results: Mutex::new(None),
        }
    }

    /// Hand the optimizer a separate validation set
    pub fn with_valset(mut self, valset: Vec<Example>) -> Self {
        self.valset = Some(valset);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &OptiglotConfig {
        &self.config
    }

    /// Directory holding this session's handoff artifacts
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Get current session state
    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Result metadata the optimizer sent with `finalize`
    pub fn results(&self) -> Option<Value> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Optimize `program`'s instructions with the configured optimizer.
    ///
    /// Resolves with the program carrying the winning candidate, or fails with
    /// the first fatal cause. The server, the optimizer process and the work
    /// directory are released either way.
    #[instrument(
        skip_all,
        fields(
            optiglot.session_id = tracing::field::Empty,
            optiglot.algorithm = tracing::field::Empty,
            optiglot.port = tracing::field::Empty,
            dataset_size = dataset.len(),
        )
    )]
    pub async fn compile(
        &self,
        program: Arc<Program>,
        metric: Arc<dyn Metric>,
        dataset: Vec<Example>,
    ) -> Result<Arc<Program>, SessionError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(SessionError::AlreadyStarted);
        }
        TraceContext::for_session(SessionId::new(self.id.to_string()))
            .with_algorithm(self.config.algorithm.as_str())
            .record_on_span();

        let mut resources = Resources::default();
        let outcome = self
            .drive(&program, metric, &dataset, &mut resources)
            .await;
        if let Err(e) = &outcome {
            let settled = self.state.read().await.is_terminal();
            if !settled {
                self.set_state(SessionState::Failed {
                    error: e.to_string(),
                })
                .await;
            }
        }
        self.teardown(resources).await;

        let finalized = outcome?;
        let applied = program.apply_candidate(&finalized.best_candidate);
        info!(applied, "Applied winning candidate");
        *self.results.lock().unwrap_or_else(PoisonError::into_inner) = Some(finalized.results);
        Ok(program)
    }

    async fn drive(
        &self,
        program: &Arc<Program>,
        metric: Arc<dyn Metric>,
        dataset: &[Example],
        resources: &mut Resources,
    ) -> Result<FinalizeRequest, SessionError> {
        // Listen
        let (finalize_tx, finalize_rx) = finalize_channel();
        let eval_state = EvalState::new(Arc::clone(program), finalize_tx)
            .with_metric(metric)
            .with_concurrency(self.config.evaluation.concurrency);
        let server_config = ServerConfig::new(&self.config.server.host, self.config.server.port);
        let server = EvalServer::new(server_config, Arc::new(eval_state))
            .start()
            .await?;
        let port = server.addr().port();
        let callback_url = server.url();
        resources.server = Some(server);
        TraceContext::new().with_port(port).record_on_span();
        self.set_state(SessionState::Listening { port }).await;

        // Hand off
        let work_dir = optiglot_paths::create_session_dir(&self.work_root, &self.id.to_string())?;
        resources.work_dir = Some(work_dir);
        let config_path = self.write_handoff(program, dataset, &callback_url, port)?;
        self.set_state(SessionState::ConfigWritten {
            path: config_path.clone(),
        })
        .await;

        // Spawn
        let child = match spawn_optimizer(&self.config.optimizer, port, &config_path, &callback_url)
        {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to spawn optimizer: {}", e);
                self.set_state(SessionState::SpawnFailed {
                    error: e.to_string(),
                })
                .await;
                return Err(e);
            }
        };
        self.set_state(SessionState::ProcessSpawned { pid: child.id() })
            .await;
        let child = resources.child.insert(child);

        // Run
        self.set_state(SessionState::Running).await;
        let (next_state, outcome) = self.await_completion(child, finalize_rx).await;
        self.set_state(next_state).await;
        outcome
    }

    fn write_handoff(
        &self,
        program: &Program,
        dataset: &[Example],
        callback_url: &str,
        port: u16,
    ) -> Result<PathBuf, SessionError> {
        let dataset_path = self.work_dir.join(DATASET_FILE);
        write_dataset(&dataset_path, dataset)?;

        let valset_path = match &self.valset {
            Some(valset) => {
                let path = self.work_dir.join(VALSET_FILE);
                write_dataset(&path, valset)?;
                Some(path)
            }
            None => None,
        };

        let handoff = Handoff {
            algorithm: self.config.algorithm.clone(),
            dataset_path,
            valset_path,
            seed_candidate: program.instructions(),
            callback_url: callback_url.to_string(),
            port,
            options: self.config.options.clone(),
            program: program.snapshot().as_ref().clone(),
        };
        handoff.write(&self.work_dir)
    }

    /// Wait for whichever comes first: finalize, process exit, or timeout
    async fn await_completion(
        &self,
        child: &mut Child,
        mut finalize_rx: FinalizeReceiver,
    ) -> (SessionState, Result<FinalizeRequest, SessionError>) {
        let timeout = self.config.session.timeout();
        let deadline = async {
            match timeout {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            received = &mut finalize_rx => match received {
                Ok(request) => (SessionState::Finalized, Ok(request)),
                Err(_) => (
                    SessionState::ExitedWithoutResult,
                    Err(ServerError::Internal("finalize signal dropped".to_string()).into()),
                ),
            },
            status = child.wait() => {
                // A finalize that raced with the exit still counts.
                if let Ok(request) = finalize_rx.try_recv() {
                    return (SessionState::Finalized, Ok(request));
                }
                match status {
                    Ok(status) if status.success() => {
                        warn!("Optimizer exited without finalizing");
                        (SessionState::ExitedWithoutResult, Err(SessionError::ExitedWithoutResult))
                    }
                    Ok(status) => {
                        error!(%status, "Optimizer failed");
                        let code = status.code();
                        (SessionState::ProcessFailed { code }, Err(SessionError::ProcessFailed { code }))
                    }
                    Err(e) => (SessionState::ProcessFailed { code: None }, Err(SessionError::Wait(e))),
                }
            },
            _ = deadline => {
                let duration = timeout.unwrap_or_default();
                warn!(timeout_secs = duration.as_secs(), "Optimizer timed out");
                (SessionState::TimedOut, Err(SessionError::TimedOut(duration)))
            },
        }
    }

    /// Stop the server and the optimizer together. Neither waits on the
    /// other, so a batch still in flight cannot hold the process alive.
    async fn teardown(&self, resources: Resources) {
        let Resources {
            server,
            child,
            work_dir,
        } = resources;
        let grace = self.config.session.shutdown_grace();
        let stop_server = async {
            if let Some(server) = server
                && let Err(e) = server.shutdown(grace).await
            {
                warn!("Evaluation server did not stop cleanly: {}", e);
            }
        };
        let stop_process = async {
            if let Some(mut child) = child {
                reap(&mut child, grace).await;
            }
        };
        tokio::join!(stop_server, stop_process);

        let artifacts = match work_dir {
            Some(dir) if self.config.session.keep_artifacts => {
                info!("Keeping session artifacts in {}", dir.display());
                Some(dir)
            }
            Some(dir) => {
                if let Err(e) = std::fs::remove_dir_all(&dir) {
                    warn!("Failed to remove {}: {}", dir.display(), e);
                }
                None
            }
            None => None,
        };

        if *self.state.read().await == SessionState::Finalized {
            self.set_state(SessionState::TornDown).await;
        }
        self.emit(SessionEvent::TornDown { artifacts });
        debug!("Session torn down");
    }

    /// Set state and log change
    async fn set_state(&self, new_state: SessionState) {
        let mut state = self.state.write().await;
        debug!("Session state: {:?} -> {:?}", *state, new_state);
        let from = std::mem::replace(&mut *state, new_state.clone());
        drop(state);
        self.emit(SessionEvent::StateChanged {
            from,
            to: new_state,
            at: Utc::now(),
        });
    }

    /// Emit an event
    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizerSection;

    fn config_in(dir: &Path) -> OptiglotConfig {
        let mut config = OptiglotConfig::default();
        config.session.work_dir = Some(dir.to_path_buf());
        config.optimizer = OptimizerSection {
            command: "true".to_string(),
            args: Vec::new(),
        };
        config
    }

    #[test]
    fn work_dir_is_unique_per_session() {
        let dir = tempfile::tempdir().unwrap();
        let a = OptimizationSession::new(config_in(dir.path()));
        let b = OptimizationSession::new(config_in(dir.path()));

        assert_ne!(a.id(), b.id());
        assert!(a.work_dir().starts_with(dir.path()));
        assert_ne!(a.work_dir(), b.work_dir());
    }

    #[tokio::test]
    async fn new_session_is_created_without_results() {
        let dir = tempfile::tempdir().unwrap();
        let session = OptimizationSession::new(config_in(dir.path()));

        assert_eq!(session.state().await, SessionState::Created);
        assert!(session.results().is_none());
    }

    #[tokio::test]
    async fn state_changes_are_broadcast() {
        let dir = tempfile::tempdir().unwrap();
        let session = OptimizationSession::new(config_in(dir.path()));
        let mut rx = session.subscribe();

        session.set_state(SessionState::Running).await;

        match rx.recv().await.unwrap() {
            SessionEvent::StateChanged { from, to, .. } => {
                assert_eq!(from, SessionState::Created);
                assert_eq!(to, SessionState::Running);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
