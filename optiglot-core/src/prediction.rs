//! Rollout outcomes and trace records.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Usage;

/// Classification of a rollout or predictor failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// The shim rejected the inputs or the model output against the signature
    ValidationError,
    /// The model output could not be parsed into the signature's fields
    ParseError,
    /// The model call itself failed (transport, provider, rate limit)
    ModelError,
    /// Forward logic asked for a predictor the program does not have
    UnknownPredictor,
    /// Forward logic returned its own error
    HostError,
    /// Forward logic panicked
    Panic,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ValidationError => "ValidationError",
            FailureKind::ParseError => "ParseError",
            FailureKind::ModelError => "ModelError",
            FailureKind::UnknownPredictor => "UnknownPredictor",
            FailureKind::HostError => "HostError",
            FailureKind::Panic => "Panic",
        }
    }

    /// True for failures raised by the predictor shim rather than host code
    pub fn is_shim_failure(&self) -> bool {
        matches!(
            self,
            FailureKind::ValidationError
                | FailureKind::ParseError
                | FailureKind::ModelError
                | FailureKind::UnknownPredictor
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured description of a failed rollout or predictor call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureDescriptor {
    pub kind: FailureKind,
    pub message: String,
    #[serde(default)]
    pub detail: Option<String>,
}

impl FailureDescriptor {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for FailureDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Outcome of one rollout: a success value or a failure descriptor.
///
/// On the wire this is `{"output": ..., "error": ...}` with exactly one side
/// populated. A success whose value is `null` is sent as
/// `{"output": null, "error": null}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "PredictionRepr", try_from = "PredictionRepr")]
pub enum Prediction {
    Success(Value),
    Failure(FailureDescriptor),
}

impl Prediction {
    pub fn is_success(&self) -> bool {
        matches!(self, Prediction::Success(_))
    }

    /// The success value, if any
    pub fn output(&self) -> Option<&Value> {
        match self {
            Prediction::Success(value) => Some(value),
            Prediction::Failure(_) => None,
        }
    }

    /// The failure descriptor, if any
    pub fn failure(&self) -> Option<&FailureDescriptor> {
        match self {
            Prediction::Success(_) => None,
            Prediction::Failure(failure) => Some(failure),
        }
    }

    /// Look up a field of an object-shaped success value
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.output().and_then(|value| value.get(name))
    }
}

#[derive(Serialize, Deserialize)]
struct PredictionRepr {
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<FailureDescriptor>,
}

impl From<Prediction> for PredictionRepr {
    fn from(prediction: Prediction) -> Self {
        match prediction {
            Prediction::Success(value) => Self {
                output: Some(value),
                error: None,
            },
            Prediction::Failure(failure) => Self {
                output: None,
                error: Some(failure),
            },
        }
    }
}

impl TryFrom<PredictionRepr> for Prediction {
    type Error = String;

    fn try_from(repr: PredictionRepr) -> Result<Self, Self::Error> {
        match (repr.output, repr.error) {
            (Some(_), Some(_)) => Err("prediction has both output and error".to_string()),
            (None, Some(failure)) => Ok(Prediction::Failure(failure)),
            (output, None) => Ok(Prediction::Success(output.unwrap_or(Value::Null))),
        }
    }
}

/// One recorded predictor invocation within a rollout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Name of the predictor that was called
    pub predictor: String,
    /// Inputs passed to the predictor
    pub inputs: Value,
    /// Output on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Failure on error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureDescriptor>,
    /// Tokens consumed by this call, when the shim reports them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl TraceEntry {
    pub fn success(predictor: impl Into<String>, inputs: Value, output: Value) -> Self {
        Self {
            predictor: predictor.into(),
            inputs,
            output: Some(output),
            error: None,
            usage: None,
        }
    }

    pub fn failure(predictor: impl Into<String>, inputs: Value, error: FailureDescriptor) -> Self {
        Self {
            predictor: predictor.into(),
            inputs,
            output: None,
            error: Some(error),
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Option<Usage>) -> Self {
        self.usage = usage;
        self
    }
}
