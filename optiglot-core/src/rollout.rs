//! Rollouts: one execution of the host forward logic against one example.
//!
//! Each rollout owns a [`RolloutContext`]. Forward logic receives it by
//! reference and routes every predictor call through
//! [`RolloutContext::predict`], which appends to that rollout's trace and no
//! other. Concurrent rollouts therefore never share trace state, whatever the
//! runtime's scheduling.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::PredictorError;
use crate::lm::{LanguageModel, PredictRequest};
use crate::prediction::{FailureDescriptor, FailureKind, Prediction, TraceEntry};
use crate::program::{Forward, ProgramSnapshot};
use crate::types::{Example, LmConfig};

/// Per-rollout handle through which forward logic calls predictors
pub struct RolloutContext {
    snapshot: Arc<ProgramSnapshot>,
    lm: Arc<dyn LanguageModel>,
    lm_override: Option<LmConfig>,
    trace: Mutex<Vec<TraceEntry>>,
}

impl RolloutContext {
    /// Start a fresh, empty trace bound to this rollout
    pub fn begin(
        snapshot: Arc<ProgramSnapshot>,
        lm: Arc<dyn LanguageModel>,
        lm_override: Option<LmConfig>,
    ) -> Self {
        Self {
            snapshot,
            lm,
            lm_override,
            trace: Mutex::new(Vec::new()),
        }
    }

    /// Instructions the named predictor runs with in this rollout
    pub fn instructions(&self, predictor: &str) -> Option<&str> {
        self.snapshot
            .get(predictor)
            .map(|p| p.instructions.as_str())
    }

    /// Call a predictor and record the call in this rollout's trace.
    ///
    /// Exactly one trace entry is appended, whether the call succeeds or not.
    pub async fn predict(
        &self,
        predictor: &str,
        inputs: impl Into<Value>,
    ) -> Result<Value, PredictorError> {
        let inputs = inputs.into();

        let Some(state) = self.snapshot.get(predictor) else {
            let error = PredictorError::UnknownPredictor(predictor.to_string());
            self.record(TraceEntry::failure(predictor, inputs, error.to_descriptor()));
            return Err(error);
        };

        let request = PredictRequest {
            predictor: predictor.to_string(),
            signature: state.signature.clone(),
            instructions: state.instructions.clone(),
            demos: state.demos.clone(),
            inputs: inputs.clone(),
            lm: self.lm_override.clone().or_else(|| state.lm.clone()),
        };

        match self.lm.predict(request).await {
            Ok(response) => {
                self.record(
                    TraceEntry::success(predictor, inputs, response.output.clone())
                        .with_usage(response.usage),
                );
                Ok(response.output)
            }
            Err(error) => {
                debug!(predictor, error = %error, "Predictor call failed");
                self.record(TraceEntry::failure(predictor, inputs, error.to_descriptor()));
                Err(error)
            }
        }
    }

    /// Number of predictor calls recorded so far
    pub fn trace_len(&self) -> usize {
        self.lock_trace().len()
    }

    /// Consume the context, returning its trace
    pub fn into_trace(self) -> Vec<TraceEntry> {
        self.trace.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, entry: TraceEntry) {
        self.lock_trace().push(entry);
    }

    fn lock_trace(&self) -> std::sync::MutexGuard<'_, Vec<TraceEntry>> {
        self.trace.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Prediction and trace of one finished rollout
#[derive(Debug, Clone, PartialEq)]
pub struct RolloutOutcome {
    pub prediction: Prediction,
    /// Entries recorded before completion; partial when the rollout failed
    pub trace: Vec<TraceEntry>,
}

/// Runs examples through the forward logic against a fixed snapshot
pub struct RolloutExecutor {
    forward: Arc<dyn Forward>,
    lm: Arc<dyn LanguageModel>,
    snapshot: Arc<ProgramSnapshot>,
    lm_override: Option<LmConfig>,
}

impl RolloutExecutor {
    pub fn new(
        forward: Arc<dyn Forward>,
        lm: Arc<dyn LanguageModel>,
        snapshot: Arc<ProgramSnapshot>,
        lm_override: Option<LmConfig>,
    ) -> Self {
        Self {
            forward,
            lm,
            snapshot,
            lm_override,
        }
    }

    /// Run one example. Never fails: errors and panics become failure predictions.
    pub async fn run(&self, example: Example) -> RolloutOutcome {
        let ctx = RolloutContext::begin(
            Arc::clone(&self.snapshot),
            Arc::clone(&self.lm),
            self.lm_override.clone(),
        );

        let result = AssertUnwindSafe(self.forward.forward(&ctx, example))
            .catch_unwind()
            .await;

        let prediction = match result {
            Ok(Ok(value)) => Prediction::Success(value),
            Ok(Err(error)) => Prediction::Failure(error.to_descriptor()),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(message = %message, "Forward logic panicked");
                Prediction::Failure(FailureDescriptor::new(FailureKind::Panic, message))
            }
        };

        RolloutOutcome {
            prediction,
            trace: ctx.into_trace(),
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
