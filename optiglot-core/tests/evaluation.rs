//! Batch evaluation properties under concurrency
//!
//! These tests validate that:
//! - Reports are positional regardless of how many workers run
//! - Each rollout's trace holds only its own predictor calls
//! - A failing metric only zeroes its own example
//! - A candidate applied mid-batch never leaks into that batch

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use optiglot_core::{
    BatchEvaluator, Candidate, EvaluateParams, Example, Forward, ForwardError, MetricCall,
    MetricError, MockLanguageModel, PredictResponse, Predictor, Program, RolloutContext,
    Signature, metric_fn,
};
use serde_json::{Value, json};

/// Calls `judge` then `explain`, passing the example id through both.
struct TwoStage;

#[async_trait]
impl Forward for TwoStage {
    async fn forward(&self, ctx: &RolloutContext, inputs: Example) -> Result<Value, ForwardError> {
        let id = inputs.get("id").cloned().unwrap_or(Value::Null);
        let label = ctx.predict("judge", json!({"id": id})).await?;
        ctx.predict("explain", json!({"id": id, "label": label})).await?;
        Ok(label)
    }
}

/// Slower models for lower ids, so rollouts finish out of order.
fn staggered_lm() -> MockLanguageModel {
    MockLanguageModel::new(|req| {
        Ok(PredictResponse::new(json!({
            "id": req.inputs["id"],
            "instructions": req.instructions,
        })))
    })
    .with_delay_fn(|req| {
        let id = req.inputs["id"].as_u64().unwrap_or(0);
        Duration::from_millis(100 - id * 7)
    })
}

fn program(lm: MockLanguageModel) -> Arc<Program> {
    Arc::new(
        Program::builder(Arc::new(TwoStage), Arc::new(lm))
            .predictor(
                "judge",
                Predictor::new(Signature::parse("id -> label").unwrap(), "judge v0"),
            )
            .predictor(
                "explain",
                Predictor::new(Signature::parse("id, label -> reason").unwrap(), "explain v0"),
            )
            .build()
            .unwrap(),
    )
}

fn batch(n: u64) -> Vec<Example> {
    (0..n).map(|id| Example::new().with("id", id)).collect()
}

fn id_score() -> Arc<dyn optiglot_core::Metric> {
    Arc::new(metric_fn(|call: MetricCall<'_>| {
        Ok(call.gold.get("id").and_then(Value::as_f64).unwrap_or(-1.0))
    }))
}

#[tokio::test(start_paused = true)]
async fn reports_match_between_one_and_many_workers() {
    let serial = BatchEvaluator::new(program(staggered_lm()), id_score())
        .evaluate(EvaluateParams::new(batch(12), Candidate::new()).concurrency(1))
        .await;
    let parallel = BatchEvaluator::new(program(staggered_lm()), id_score())
        .evaluate(EvaluateParams::new(batch(12), Candidate::new()).concurrency(5))
        .await;

    assert_eq!(serial.outputs, parallel.outputs);
    assert_eq!(serial.scores, parallel.scores);
}

#[tokio::test(start_paused = true)]
async fn traces_stay_with_their_rollout() {
    let evaluator = BatchEvaluator::new(program(staggered_lm()), id_score());

    let report = evaluator
        .evaluate(
            EvaluateParams::new(batch(8), Candidate::new())
                .concurrency(8)
                .capture_traces(true),
        )
        .await;

    assert_eq!(report.trajectories.len(), 8);
    for (i, trajectory) in report.trajectories.iter().enumerate() {
        assert_eq!(trajectory.trace.len(), 2, "rollout {i} has exactly its own calls");
        for entry in &trajectory.trace {
            assert_eq!(entry.inputs["id"], json!(i), "rollout {i} saw a foreign entry");
        }
        assert_eq!(trajectory.trace[0].predictor, "judge");
        assert_eq!(trajectory.trace[1].predictor, "explain");
    }
}

#[tokio::test(start_paused = true)]
async fn one_failing_metric_call_zeroes_only_that_example() {
    let metric = Arc::new(metric_fn(|call: MetricCall<'_>| {
        match call.gold.get("id").and_then(Value::as_u64) {
            Some(3) => Err(MetricError::failed("cannot score id 3")),
            Some(id) => Ok(1.0 + id as f64),
            None => Ok(0.0),
        }
    }));
    let evaluator = BatchEvaluator::new(program(staggered_lm()), metric);

    let report = evaluator
        .evaluate(EvaluateParams::new(batch(6), Candidate::new()).concurrency(3))
        .await;

    assert_eq!(report.scores.len(), 6);
    assert_eq!(report.scores[3].score, 0.0);
    assert_eq!(report.scores[3].feedback, "Metric evaluation failed.");
    for i in [0usize, 1, 2, 4, 5] {
        assert_eq!(report.scores[i].score, 1.0 + i as f64);
    }
}

#[tokio::test(start_paused = true)]
async fn candidate_applied_mid_batch_does_not_leak_into_it() {
    let program = program(staggered_lm());
    let evaluator = BatchEvaluator::new(Arc::clone(&program), id_score());

    let evaluation = evaluator.evaluate(
        EvaluateParams::new(batch(6), Candidate::new().with("judge", "judge X")).concurrency(2),
    );
    let interloper = async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        program.apply_candidate(&Candidate::new().with("judge", "judge Y"));
    };
    let (report, ()) = tokio::join!(evaluation, interloper);

    for output in &report.outputs {
        assert_eq!(output.field("instructions"), Some(&json!("judge X")));
    }
    assert_eq!(program.instructions().get("judge"), Some("judge Y"));
}

/// Two-ticket classification through a keyword "model".
struct TicketJudge;

#[async_trait]
impl Forward for TicketJudge {
    async fn forward(&self, ctx: &RolloutContext, inputs: Example) -> Result<Value, ForwardError> {
        ctx.predict("judge", inputs).await.map_err(Into::into)
    }
}

#[tokio::test]
async fn ticket_classification_end_to_end() {
    let lm = MockLanguageModel::new(|req| {
        let ticket = req.inputs["ticket"].as_str().unwrap_or_default();
        let label = if ticket.contains("log in") { "account" } else { "shipping" };
        Ok(PredictResponse::new(json!({"label": label})))
    });
    let program = Arc::new(
        Program::builder(Arc::new(TicketJudge), Arc::new(lm))
            .predictor(
                "judge",
                Predictor::new(Signature::parse("ticket -> label").unwrap(), "seed"),
            )
            .build()
            .unwrap(),
    );
    let metric = Arc::new(metric_fn(|call: MetricCall<'_>| {
        let expected = call.gold.get_str("label").unwrap_or_default();
        Ok(call.prediction.field("label").and_then(Value::as_str) == Some(expected))
    }));
    let batch = vec![
        Example::new().with("ticket", "can't log in").with("label", "account"),
        Example::new().with("ticket", "where's my order").with("label", "billing"),
    ];

    let report = BatchEvaluator::new(program, metric)
        .evaluate(
            EvaluateParams::new(batch, Candidate::new().with("judge", "Classify..."))
                .concurrency(2)
                .inputs_mapper(Arc::new(|e: &Example| e.project(&["ticket"]))),
        )
        .await;

    assert_eq!(report.outputs.len(), 2);
    assert_eq!(report.scores.len(), 2);
    assert!(report.scores.iter().all(|s| s.score == 0.0 || s.score == 1.0));
    assert_eq!(report.scores[0].score, 1.0);
    assert_eq!(report.scores[1].score, 0.0);
}
