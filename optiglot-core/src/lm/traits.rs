//! LanguageModel trait and request/response types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PredictorError;
use crate::program::Signature;
use crate::types::{Example, LmConfig, Usage};

/// Everything the shim needs to perform one predictor call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub predictor: String,
    pub signature: Signature,
    pub instructions: String,
    pub demos: Vec<Example>,
    pub inputs: Value,
    /// Batch-level override if one was sent, otherwise the predictor's own
    pub lm: Option<LmConfig>,
}

/// Output of one predictor call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub output: Value,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl PredictResponse {
    pub fn new(output: Value) -> Self {
        Self {
            output,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// The model-call wrapper used by predictors.
///
/// Implementations map provider failures onto [`PredictorError`] so rollouts
/// can tell validation and parse failures from transport failures.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn predict(&self, request: PredictRequest) -> Result<PredictResponse, PredictorError>;
}
