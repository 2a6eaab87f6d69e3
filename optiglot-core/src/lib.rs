//! optiglot-core: Core library for optimizing predictor instructions
//!
//! This crate provides the pieces an external optimizer drives through the
//! evaluation protocol:
//!
//! - **Program** - [`Program`] holds host forward logic and a registry of named [`Predictor`]s
//! - **Rollouts** - [`RolloutContext`] records one rollout's predictor calls; [`RolloutExecutor`] runs one example
//! - **Batch evaluation** - [`BatchEvaluator`] runs a batch under a [`Candidate`] with bounded concurrency
//! - **Metrics** - the [`Metric`] trait and [`metric_fn`] adapter
//! - **Model shim** - the [`LanguageModel`] trait and [`MockLanguageModel`] for tests
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use optiglot_core::{
//!     BatchEvaluator, Candidate, EvaluateParams, Example, Forward, ForwardError, MetricCall,
//!     MockLanguageModel, Predictor, Program, RolloutContext, Signature, metric_fn,
//! };
//! use serde_json::Value;
//!
//! struct Classify;
//!
//! #[async_trait]
//! impl Forward for Classify {
//!     async fn forward(&self, ctx: &RolloutContext, inputs: Example) -> Result<Value, ForwardError> {
//!         Ok(ctx.predict("judge", inputs).await?)
//!     }
//! }
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let program = Program::builder(Arc::new(Classify), Arc::new(MockLanguageModel::echo()))
//!         .predictor("judge", Predictor::new(Signature::parse("ticket -> label").unwrap(), "Classify."))
//!         .build()?;
//!     let metric = metric_fn(|call: MetricCall<'_>| Ok(call.prediction.is_success()));
//!
//!     let evaluator = BatchEvaluator::new(Arc::new(program), Arc::new(metric));
//!     let batch = vec![Example::new().with("ticket", "can't log in")];
//!     let report = evaluator
//!         .evaluate(EvaluateParams::new(batch, Candidate::new()).concurrency(4))
//!         .await;
//!     println!("mean score: {:?}", report.mean_score());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! BatchEvaluator ── apply candidate + snapshot ──▶ Program
//!      │
//!      ├── worker 0 ─┐
//!      ├── worker 1 ─┼─ claim index ─▶ RolloutExecutor ─▶ Forward ─▶ RolloutContext ─▶ LanguageModel
//!      └── worker N ─┘                      │
//!                                           └─▶ Metric ─▶ slot[index]
//! ```

pub mod error;
pub mod evaluate;
pub mod lm;
pub mod metric;
pub mod prediction;
pub mod program;
pub mod report;
pub mod rollout;
pub mod types;

// Re-export key types for convenience
pub use error::{ForwardError, MetricError, PredictorError, ProgramError};
pub use evaluate::{BatchEvaluator, EvaluateParams, InputsMapper};
pub use lm::{LanguageModel, MockLanguageModel, PredictRequest, PredictResponse};
pub use metric::{FnMetric, Metric, MetricCall, MetricOutput, metric_fn, score_or_zero};
pub use prediction::{FailureDescriptor, FailureKind, Prediction, TraceEntry};
pub use program::{
    Field, FieldType, Forward, Predictor, Program, ProgramBuilder, ProgramSnapshot, Signature,
};
pub use report::{EvaluationReport, METRIC_FAILED_FEEDBACK, ScoredResult, Trajectory};
pub use rollout::{RolloutContext, RolloutExecutor, RolloutOutcome};
pub use types::{Candidate, Example, LmConfig, ModelType, Usage};
