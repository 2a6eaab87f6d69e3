//! Scoring functions.
//!
//! A [`Metric`] judges one prediction against its gold example. It may answer
//! with a bare number or a score with feedback; either way the evaluator
//! normalizes the answer into a [`ScoredResult`]. A metric that errors or
//! panics only zeroes its own example.

use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::warn;

use crate::error::MetricError;
use crate::prediction::{Prediction, TraceEntry};
use crate::report::ScoredResult;
use crate::rollout::panic_message;
use crate::types::Example;

/// Arguments to one metric invocation
#[derive(Debug, Clone, Copy)]
pub struct MetricCall<'a> {
    pub gold: &'a Example,
    pub prediction: &'a Prediction,
    pub trace: &'a [TraceEntry],
    /// Predictor the optimizer is asking about, for per-predictor feedback
    pub pred_name: Option<&'a str>,
    /// That predictor's slice of the trace
    pub pred_trace: Option<&'a [TraceEntry]>,
}

impl<'a> MetricCall<'a> {
    pub fn new(gold: &'a Example, prediction: &'a Prediction, trace: &'a [TraceEntry]) -> Self {
        Self {
            gold,
            prediction,
            trace,
            pred_name: None,
            pred_trace: None,
        }
    }

    pub fn for_predictor(mut self, name: Option<&'a str>, trace: Option<&'a [TraceEntry]>) -> Self {
        self.pred_name = name;
        self.pred_trace = trace;
        self
    }
}

/// What a metric may return
#[derive(Debug, Clone, PartialEq)]
pub enum MetricOutput {
    Score(f64),
    Scored(ScoredResult),
}

impl MetricOutput {
    pub fn into_scored(self) -> ScoredResult {
        match self {
            MetricOutput::Score(score) => ScoredResult::from_score(score),
            MetricOutput::Scored(scored) => scored,
        }
    }
}

impl From<f64> for MetricOutput {
    fn from(score: f64) -> Self {
        MetricOutput::Score(score)
    }
}

impl From<bool> for MetricOutput {
    fn from(correct: bool) -> Self {
        MetricOutput::Score(if correct { 1.0 } else { 0.0 })
    }
}

impl From<ScoredResult> for MetricOutput {
    fn from(scored: ScoredResult) -> Self {
        MetricOutput::Scored(scored)
    }
}

#[async_trait]
pub trait Metric: Send + Sync {
    async fn score(&self, call: MetricCall<'_>) -> Result<MetricOutput, MetricError>;
}

/// Adapts a synchronous closure into a [`Metric`]
pub struct FnMetric<F, O> {
    f: F,
    _output: PhantomData<fn() -> O>,
}

#[async_trait]
impl<F, O> Metric for FnMetric<F, O>
where
    F: Fn(MetricCall<'_>) -> Result<O, MetricError> + Send + Sync,
    O: Into<MetricOutput>,
{
    async fn score(&self, call: MetricCall<'_>) -> Result<MetricOutput, MetricError> {
        (self.f)(call).map(Into::into)
    }
}

/// Build a metric from a closure returning anything convertible to [`MetricOutput`]
pub fn metric_fn<F, O>(f: F) -> FnMetric<F, O>
where
    F: Fn(MetricCall<'_>) -> Result<O, MetricError> + Send + Sync,
    O: Into<MetricOutput>,
{
    FnMetric {
        f,
        _output: PhantomData,
    }
}

/// Score one call, mapping metric errors and panics to a zero score
pub async fn score_or_zero(metric: &dyn Metric, call: MetricCall<'_>) -> ScoredResult {
    match AssertUnwindSafe(metric.score(call)).catch_unwind().await {
        Ok(Ok(output)) => output.into_scored(),
        Ok(Err(error)) => {
            warn!(error = %error, "Metric failed");
            ScoredResult::metric_failed()
        }
        Err(panic) => {
            warn!(message = %panic_message(panic.as_ref()), "Metric panicked");
            ScoredResult::metric_failed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exact_label() -> impl Metric {
        metric_fn(|call: MetricCall<'_>| {
            let expected = call
                .gold
                .get_str("label")
                .ok_or_else(|| MetricError::MissingField("label".into()))?;
            Ok(call.prediction.field("label").and_then(|v| v.as_str()) == Some(expected))
        })
    }

    #[tokio::test]
    async fn bool_metric_scores_one_or_zero() {
        let metric = exact_label();
        let gold = Example::new().with("label", "account");
        let right = Prediction::Success(json!({"label": "account"}));
        let wrong = Prediction::Success(json!({"label": "billing"}));

        let hit = score_or_zero(&metric, MetricCall::new(&gold, &right, &[])).await;
        let miss = score_or_zero(&metric, MetricCall::new(&gold, &wrong, &[])).await;

        assert_eq!(hit.score, 1.0);
        assert_eq!(miss.score, 0.0);
        assert_eq!(miss.feedback, "This trajectory got a score of 0.");
    }

    #[tokio::test]
    async fn scored_result_passes_feedback_through() {
        let metric = metric_fn(|_: MetricCall<'_>| Ok(ScoredResult::new(0.25, "close")));
        let gold = Example::new();
        let prediction = Prediction::Success(json!(null));

        let scored = score_or_zero(&metric, MetricCall::new(&gold, &prediction, &[])).await;

        assert_eq!(scored, ScoredResult::new(0.25, "close"));
    }

    #[tokio::test]
    async fn metric_error_becomes_zero_score() {
        let metric = exact_label();
        let gold = Example::new();
        let prediction = Prediction::Success(json!({"label": "x"}));

        let scored = score_or_zero(&metric, MetricCall::new(&gold, &prediction, &[])).await;

        assert_eq!(scored, ScoredResult::metric_failed());
    }

    #[tokio::test]
    async fn metric_panic_becomes_zero_score() {
        let metric = metric_fn(|_: MetricCall<'_>| -> Result<f64, MetricError> {
            panic!("metric bug")
        });
        let gold = Example::new();
        let prediction = Prediction::Success(json!(1));

        let scored = score_or_zero(&metric, MetricCall::new(&gold, &prediction, &[])).await;

        assert_eq!(scored, ScoredResult::metric_failed());
    }

    #[test]
    fn predictor_scope_is_optional() {
        let gold = Example::new();
        let prediction = Prediction::Success(json!(1));
        let call = MetricCall::new(&gold, &prediction, &[]);
        assert!(call.pred_name.is_none());

        let call = call.for_predictor(Some("judge"), Some(&[]));
        assert_eq!(call.pred_name, Some("judge"));
    }
}
