//! Shared state for the evaluation server

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use optiglot_core::{Metric, Program};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::http::FinalizeRequest;

/// Sending half of the one-shot completion signal
pub type FinalizeSender = oneshot::Sender<FinalizeRequest>;
/// Receiving half, awaited by the session
pub type FinalizeReceiver = oneshot::Receiver<FinalizeRequest>;

/// Create the completion signal for one session
pub fn finalize_channel() -> (FinalizeSender, FinalizeReceiver) {
    oneshot::channel()
}

/// State shared by all handlers of one session's server
pub struct EvalState {
    /// Program whose predictors are evaluated and tuned
    pub program: Arc<Program>,
    /// Scoring function; `None` until the session binds one
    pub metric: Option<Arc<dyn Metric>>,
    /// Rollout workers per batch
    pub concurrency: usize,
    /// When the server started
    pub started_at: DateTime<Utc>,
    /// Serializes `evaluate` calls so candidates never interleave
    evaluation_lock: tokio::sync::Mutex<()>,
    finalize_tx: Mutex<Option<FinalizeSender>>,
    finalized: AtomicBool,
    evaluations: AtomicU64,
    shutdown: CancellationToken,
}

impl EvalState {
    pub fn new(program: Arc<Program>, finalize_tx: FinalizeSender) -> Self {
        Self {
            program,
            metric: None,
            concurrency: 1,
            started_at: Utc::now(),
            evaluation_lock: tokio::sync::Mutex::new(()),
            finalize_tx: Mutex::new(Some(finalize_tx)),
            finalized: AtomicBool::new(false),
            evaluations: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_metric(mut self, metric: Arc<dyn Metric>) -> Self {
        self.metric = Some(metric);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Returns how long the server has been running
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }

    /// Number of `evaluate` calls served
    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    /// Cancelled when the server stops; in-flight batches give up on it
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub(crate) async fn lock_evaluation(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.evaluation_lock.lock().await
    }

    pub(crate) fn record_evaluation(&self) -> u64 {
        self.evaluations.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Fire the completion signal. Returns false if it already fired.
    pub(crate) fn finalize(&self, request: FinalizeRequest) -> bool {
        let sender = self
            .finalize_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(sender) = sender else {
            return false;
        };
        self.finalized.store(true, Ordering::Release);
        if sender.send(request).is_err() {
            tracing::warn!("Finalize received but nobody is waiting for the result");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use optiglot_core::{Candidate, Example, Forward, ForwardError, MockLanguageModel, RolloutContext};
    use serde_json::Value;

    struct Noop;

    #[async_trait]
    impl Forward for Noop {
        async fn forward(&self, _ctx: &RolloutContext, _inputs: Example) -> Result<Value, ForwardError> {
            Ok(Value::Null)
        }
    }

    fn state() -> (EvalState, FinalizeReceiver) {
        let program = Program::builder(Arc::new(Noop), Arc::new(MockLanguageModel::echo()))
            .build()
            .unwrap();
        let (tx, rx) = finalize_channel();
        (EvalState::new(Arc::new(program), tx), rx)
    }

    fn finalize_request(label: &str) -> FinalizeRequest {
        FinalizeRequest {
            best_candidate: Candidate::new().with("judge", label),
            results: Value::Null,
        }
    }

    #[test]
    fn new_state_is_not_finalized() {
        let (state, _rx) = state();
        assert!(!state.is_finalized());
        assert_eq!(state.evaluations(), 0);
        assert!(state.uptime_seconds() >= 0);
        assert!(state.metric.is_none());
    }

    #[test]
    fn concurrency_is_at_least_one() {
        let (state, _rx) = state();
        assert_eq!(state.with_concurrency(0).concurrency, 1);
    }

    #[tokio::test]
    async fn first_finalize_wins() {
        let (state, rx) = state();

        assert!(state.finalize(finalize_request("first")));
        assert!(!state.finalize(finalize_request("second")));

        let delivered = rx.await.unwrap();
        assert_eq!(delivered.best_candidate.get("judge"), Some("first"));
        assert!(state.is_finalized());
    }

    #[test]
    fn shutdown_token_is_shared() {
        let (state, _rx) = state();
        assert!(!state.is_shutting_down());

        state.shutdown_token().cancel();

        assert!(state.is_shutting_down());
    }

    #[test]
    fn finalize_without_receiver_still_counts() {
        let (state, rx) = state();
        drop(rx);
        assert!(state.finalize(finalize_request("orphan")));
        assert!(state.is_finalized());
    }
}
