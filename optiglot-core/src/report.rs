//! Scores and batch evaluation reports.

use serde::{Deserialize, Serialize};

use crate::prediction::{Prediction, TraceEntry};
use crate::types::{Example, Usage};

/// Feedback recorded when the metric itself fails for an example
pub const METRIC_FAILED_FEEDBACK: &str = "Metric evaluation failed.";

/// The metric's judgment on one prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub score: f64,
    pub feedback: String,
}

impl ScoredResult {
    pub fn new(score: f64, feedback: impl Into<String>) -> Self {
        Self {
            score,
            feedback: feedback.into(),
        }
    }

    /// Normalize a bare numeric score
    pub fn from_score(score: f64) -> Self {
        Self {
            score,
            feedback: format!("This trajectory got a score of {}.", score),
        }
    }

    /// Zero score recorded when the metric could not be evaluated
    pub fn metric_failed() -> Self {
        Self::new(0.0, METRIC_FAILED_FEEDBACK)
    }
}

/// Everything known about one evaluated example, kept when traces are captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub index: usize,
    pub example: Example,
    pub prediction: Prediction,
    pub trace: Vec<TraceEntry>,
    pub score: ScoredResult,
}

/// Result of evaluating one batch under one candidate.
///
/// `outputs` and `scores` are indexed like the input batch. `trajectories`
/// is either empty or indexed the same way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub outputs: Vec<Prediction>,
    pub scores: Vec<ScoredResult>,
    #[serde(default)]
    pub trajectories: Vec<Trajectory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl EvaluationReport {
    /// Number of evaluated examples
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Arithmetic mean of all scores, `None` for an empty batch
    pub fn mean_score(&self) -> Option<f64> {
        if self.scores.is_empty() {
            return None;
        }
        let total: f64 = self.scores.iter().map(|s| s.score).sum();
        Some(total / self.scores.len() as f64)
    }

    /// Number of rollouts that ended in a failure prediction
    pub fn failure_count(&self) -> usize {
        self.outputs.iter().filter(|p| !p.is_success()).count()
    }
}
