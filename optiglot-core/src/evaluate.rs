//! Batch evaluation with a bounded pool of rollout workers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;
use tracing::{debug, instrument, warn};

use crate::metric::{Metric, MetricCall, score_or_zero};
use crate::prediction::Prediction;
use crate::program::Program;
use crate::report::{EvaluationReport, ScoredResult, Trajectory};
use crate::rollout::{RolloutExecutor, RolloutOutcome};
use crate::types::{Candidate, Example, LmConfig, Usage};

/// Derives rollout inputs from a dataset example, e.g. to drop gold labels
pub type InputsMapper = Arc<dyn Fn(&Example) -> Example + Send + Sync>;

/// One batch to evaluate under one candidate
#[derive(Clone)]
pub struct EvaluateParams {
    pub batch: Vec<Example>,
    pub candidate: Candidate,
    pub capture_traces: bool,
    pub concurrency: usize,
    pub lm: Option<LmConfig>,
    pub inputs_mapper: Option<InputsMapper>,
}

impl EvaluateParams {
    pub fn new(batch: Vec<Example>, candidate: Candidate) -> Self {
        Self {
            batch,
            candidate,
            capture_traces: false,
            concurrency: 1,
            lm: None,
            inputs_mapper: None,
        }
    }

    pub fn capture_traces(mut self, capture: bool) -> Self {
        self.capture_traces = capture;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn lm(mut self, lm: Option<LmConfig>) -> Self {
        self.lm = lm;
        self
    }

    pub fn inputs_mapper(mut self, mapper: InputsMapper) -> Self {
        self.inputs_mapper = Some(mapper);
        self
    }
}

impl std::fmt::Debug for EvaluateParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluateParams")
            .field("batch", &self.batch.len())
            .field("candidate", &self.candidate)
            .field("capture_traces", &self.capture_traces)
            .field("concurrency", &self.concurrency)
            .field("lm", &self.lm)
            .field("inputs_mapper", &self.inputs_mapper.is_some())
            .finish()
    }
}

/// Result for one batch index, produced by whichever worker claimed it
struct Slot {
    outcome: RolloutOutcome,
    score: ScoredResult,
}

/// Runs batches against a program and scores them with a metric
pub struct BatchEvaluator {
    program: Arc<Program>,
    metric: Arc<dyn Metric>,
}

impl BatchEvaluator {
    pub fn new(program: Arc<Program>, metric: Arc<dyn Metric>) -> Self {
        Self { program, metric }
    }

    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    /// Apply the candidate, then run and score every example.
    ///
    /// `outputs` and `scores` always have one entry per batch example, in
    /// batch order. Failures of individual rollouts or metric calls are
    /// recorded in place and never abort the batch.
    #[instrument(
        skip(self, params),
        fields(
            batch_size = params.batch.len(),
            concurrency = params.concurrency.max(1),
            capture_traces = params.capture_traces,
        )
    )]
    pub async fn evaluate(&self, params: EvaluateParams) -> EvaluationReport {
        let EvaluateParams {
            batch,
            candidate,
            capture_traces,
            concurrency,
            lm,
            inputs_mapper,
        } = params;

        let (applied, snapshot) = self.program.apply_and_snapshot(&candidate);
        debug!(applied, "Candidate applied");

        let executor = RolloutExecutor::new(self.program.forward(), self.program.lm(), snapshot, lm);
        let cursor = AtomicUsize::new(0);
        let workers = concurrency.max(1);

        let worker = |_worker_id: usize| {
            let batch = &batch;
            let cursor = &cursor;
            let executor = &executor;
            let mapper = inputs_mapper.as_ref();
            let metric = self.metric.as_ref();
            async move {
                let mut done = Vec::new();
                loop {
                    let index = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(example) = batch.get(index) else {
                        break;
                    };
                    let inputs = match mapper {
                        Some(map) => map(example),
                        None => example.clone(),
                    };

                    let outcome = executor.run(inputs).await;
                    if let Prediction::Failure(failure) = &outcome.prediction {
                        warn!(index, kind = %failure.kind, message = %failure.message, "Rollout failed");
                    }

                    let call = MetricCall::new(example, &outcome.prediction, &outcome.trace);
                    let score = score_or_zero(metric, call).await;
                    done.push((index, Slot { outcome, score }));
                }
                done
            }
        };

        let finished = join_all((0..workers).map(worker)).await;

        let mut slots: Vec<Option<Slot>> = batch.iter().map(|_| None).collect();
        for (index, slot) in finished.into_iter().flatten() {
            slots[index] = Some(slot);
        }

        let mut report = EvaluationReport::default();
        let mut usage: Option<Usage> = None;
        for (index, (slot, example)) in slots.into_iter().zip(batch).enumerate() {
            // Every index below the batch length is claimed exactly once.
            let Some(Slot { outcome, score }) = slot else {
                continue;
            };
            for entry_usage in outcome.trace.iter().filter_map(|e| e.usage) {
                *usage.get_or_insert_with(Usage::default) += entry_usage;
            }
            report.outputs.push(outcome.prediction.clone());
            report.scores.push(score.clone());
            if capture_traces {
                report.trajectories.push(Trajectory {
                    index,
                    example,
                    prediction: outcome.prediction,
                    trace: outcome.trace,
                    score,
                });
            }
        }
        report.usage = usage;

        debug!(
            failures = report.failure_count(),
            mean_score = report.mean_score(),
            "Batch evaluated"
        );
        report
    }
}
