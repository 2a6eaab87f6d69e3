//! Mock language model for testing
//!
//! MockLanguageModel answers predictor calls from a scripted handler and
//! records every request, enabling fast, deterministic rollout tests.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::traits::{LanguageModel, PredictRequest, PredictResponse};
use crate::error::PredictorError;

type Handler = Arc<dyn Fn(&PredictRequest) -> Result<PredictResponse, PredictorError> + Send + Sync>;
type DelayFn = Arc<dyn Fn(&PredictRequest) -> Duration + Send + Sync>;

/// Scripted implementation of [`LanguageModel`]
pub struct MockLanguageModel {
    handler: Handler,
    delay: Option<DelayFn>,
    calls: Mutex<Vec<PredictRequest>>,
}

impl MockLanguageModel {
    /// Answer every call with `handler`
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&PredictRequest) -> Result<PredictResponse, PredictorError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Return each call's inputs as its output
    pub fn echo() -> Self {
        Self::new(|request| Ok(PredictResponse::new(request.inputs.clone())))
    }

    /// Fail every call with `error`
    pub fn failing(error: PredictorError) -> Self {
        Self::new(move |_| Err(error.clone()))
    }

    /// Sleep for `delay` before answering, to simulate model latency
    pub fn with_delay(self, delay: Duration) -> Self {
        self.with_delay_fn(move |_| delay)
    }

    /// Per-request latency, e.g. to make some examples slower than others
    pub fn with_delay_fn<F>(mut self, delay: F) -> Self
    where
        F: Fn(&PredictRequest) -> Duration + Send + Sync + 'static,
    {
        self.delay = Some(Arc::new(delay));
        self
    }

    /// All requests received so far, in arrival order
    pub fn calls(&self) -> Vec<PredictRequest> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for MockLanguageModel {
    fn default() -> Self {
        Self::echo()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn predict(&self, request: PredictRequest) -> Result<PredictResponse, PredictorError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some(delay) = &self.delay {
            let duration = delay(&request);
            if !duration.is_zero() {
                tokio::time::sleep(duration).await;
            }
        }

        (self.handler)(&request)
    }
}
