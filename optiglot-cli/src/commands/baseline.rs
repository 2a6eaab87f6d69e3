//! `optiglot baseline` - a reference optimizer.
//!
//! Speaks the evaluation protocol from the optimizer's side without changing
//! anything: evaluates the seed candidate over the dataset with traces,
//! re-scores the trajectories through `/metric`, then finalizes with the seed
//! and its mean score. Useful for checking a host program end to end.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use optiglot_core::{EvaluationReport, ScoredResult, Trajectory};
use optiglot_server::http::{
    EvaluateRequest, FinalizeRequest, MetricEntry, MetricRequest, MetricResponse, StatusResponse,
};
use optiglot_session::Handoff;
use optiglot_session::handoff::read_dataset;
use optiglot_session::process::HOST_URL_ENV;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info, warn};

#[derive(Args)]
pub struct BaselineArgs {
    /// Port of the evaluation server
    #[arg(long)]
    pub port: u16,

    /// Handoff file written by the session
    #[arg(long)]
    pub config: PathBuf,

    /// Examples per evaluate request
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,
}

pub async fn run(args: BaselineArgs) -> Result<()> {
    let handoff = Handoff::read(&args.config)?;
    if handoff.port != args.port {
        warn!(
            flag = args.port,
            handoff = handoff.port,
            "Port flag disagrees with handoff, using the handoff callback"
        );
    }
    let base_url = std::env::var(HOST_URL_ENV).unwrap_or_else(|_| handoff.callback_url.clone());
    let dataset = read_dataset(&handoff.dataset_path)?;
    let client = ProtocolClient::new(base_url);
    let seed = handoff.seed_candidate.clone();

    info!(
        algorithm = %handoff.algorithm,
        examples = dataset.len(),
        predictors = seed.len(),
        "Probing host program"
    );

    let mut trajectories: Vec<Trajectory> = Vec::with_capacity(dataset.len());
    for batch in dataset.chunks(args.batch_size.max(1)) {
        let report: EvaluationReport = client
            .post(
                "/evaluate",
                &EvaluateRequest {
                    batch: batch.to_vec(),
                    candidate: seed.clone(),
                    capture_traces: true,
                    lm: None,
                },
            )
            .await?;
        debug!(
            batch = batch.len(),
            failures = report.failure_count(),
            "Evaluated batch"
        );
        trajectories.extend(report.trajectories);
    }

    let entries = trajectories.into_iter().map(metric_entry).collect();
    let rescored: MetricResponse = client
        .post("/metric", &MetricRequest { entries })
        .await?;
    let mean_score = mean(&rescored.scores);

    let _: StatusResponse = client
        .post(
            "/finalize",
            &FinalizeRequest {
                best_candidate: seed,
                results: json!({
                    "algorithm": handoff.algorithm,
                    "examples": rescored.scores.len(),
                    "mean_score": mean_score,
                }),
            },
        )
        .await?;

    info!(mean_score, "Baseline finalized");
    Ok(())
}

fn metric_entry(trajectory: Trajectory) -> MetricEntry {
    MetricEntry {
        gold: trajectory.example,
        prediction: trajectory.prediction,
        trace: trajectory.trace,
        pred_name: None,
        pred_trace: None,
    }
}

fn mean(scores: &[ScoredResult]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().map(|s| s.score).sum::<f64>() / scores.len() as f64)
}

/// JSON client for the evaluation server
struct ProtocolClient {
    http: reqwest::Client,
    base_url: String,
}

impl ProtocolClient {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("{} returned {}: {}", path, status, detail);
        }
        response
            .json()
            .await
            .with_context(|| format!("Unexpected response from {}", path))
    }
}
