//! Evaluation protocol handlers: `evaluate`, `metric` and `finalize`
//!
//! Each handler fails only its own request. Malformed bodies are rejected
//! with the extractor's status code and a `{"error": ...}` body.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use optiglot_core::{
    BatchEvaluator, Candidate, EvaluateParams, EvaluationReport, Example, LmConfig, MetricCall,
    Prediction, ScoredResult, TraceEntry, score_or_zero,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{EvalState, ServerError};

/// Body of `POST /evaluate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateRequest {
    pub batch: Vec<Example>,
    pub candidate: Candidate,
    #[serde(default)]
    pub capture_traces: bool,
    /// Model settings applied to every predictor call of this batch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lm: Option<LmConfig>,
}

/// One already-produced prediction to score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricEntry {
    pub gold: Example,
    pub prediction: Prediction,
    #[serde(default)]
    pub trace: Vec<TraceEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pred_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pred_trace: Option<Vec<TraceEntry>>,
}

/// Body of `POST /metric`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRequest {
    pub entries: Vec<MetricEntry>,
}

/// Response of `POST /metric`, one score per entry in request order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricResponse {
    pub scores: Vec<ScoredResult>,
}

/// Body of `POST /finalize`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeRequest {
    pub best_candidate: Candidate,
    /// Arbitrary optimizer metadata, handed back to the caller untouched
    #[serde(default)]
    pub results: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Body of every error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// POST /evaluate - Run a batch under a candidate and score it
pub async fn evaluate(
    State(state): State<Arc<EvalState>>,
    payload: Result<Json<EvaluateRequest>, JsonRejection>,
) -> Result<Json<EvaluationReport>, ServerError> {
    let metric = state.metric.clone().ok_or(ServerError::MetricNotConfigured)?;
    let Json(request) = payload?;

    let batch_size = request.batch.len();
    let params = EvaluateParams::new(request.batch, request.candidate)
        .capture_traces(request.capture_traces)
        .concurrency(state.concurrency)
        .lm(request.lm);
    let evaluator = BatchEvaluator::new(Arc::clone(&state.program), metric);

    let shutdown = state.shutdown_token();
    let report = tokio::select! {
        report = async {
            let _guard = state.lock_evaluation().await;
            evaluator.evaluate(params).await
        } => report,
        _ = shutdown.cancelled() => {
            warn!(batch_size, "Dropping in-flight batch, server is stopping");
            return Err(ServerError::ShuttingDown);
        }
    };
    let served = state.record_evaluation();

    info!(
        evaluation = served,
        batch_size,
        failures = report.failure_count(),
        "Evaluated batch"
    );
    Ok(Json(report))
}

/// POST /metric - Score predictions without running new rollouts
pub async fn metric(
    State(state): State<Arc<EvalState>>,
    payload: Result<Json<MetricRequest>, JsonRejection>,
) -> Result<Json<MetricResponse>, ServerError> {
    let metric = state.metric.clone().ok_or(ServerError::MetricNotConfigured)?;
    let Json(request) = payload?;

    let score_all = async {
        let mut scores = Vec::with_capacity(request.entries.len());
        for entry in &request.entries {
            let call = MetricCall::new(&entry.gold, &entry.prediction, &entry.trace)
                .for_predictor(entry.pred_name.as_deref(), entry.pred_trace.as_deref());
            scores.push(score_or_zero(metric.as_ref(), call).await);
        }
        scores
    };
    let shutdown = state.shutdown_token();
    let scores = tokio::select! {
        scores = score_all => scores,
        _ = shutdown.cancelled() => return Err(ServerError::ShuttingDown),
    };

    debug!(entries = scores.len(), "Scored predictions");
    Ok(Json(MetricResponse { scores }))
}

/// POST /finalize - Deliver the winning candidate; only the first call counts
pub async fn finalize(
    State(state): State<Arc<EvalState>>,
    payload: Result<Json<FinalizeRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ServerError> {
    let Json(request) = payload?;

    if state.finalize(request) {
        info!("Optimizer finalized");
    } else {
        debug!("Ignoring repeated finalize");
    }
    Ok(Json(StatusResponse::ok()))
}
