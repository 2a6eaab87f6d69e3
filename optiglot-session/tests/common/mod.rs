//! Shared test utilities for optiglot-session integration tests

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use optiglot_core::{
    Example, Forward, ForwardError, Metric, MetricCall, MockLanguageModel, PredictResponse,
    Predictor, Program, RolloutContext, Signature, metric_fn,
};
use optiglot_session::config::OptimizerSection;
use optiglot_session::{OptiglotConfig, SessionEvent, SessionState};
use serde_json::{Value, json};
use tokio::sync::broadcast;

pub struct JudgeForward;

#[async_trait]
impl Forward for JudgeForward {
    async fn forward(&self, ctx: &RolloutContext, inputs: Example) -> Result<Value, ForwardError> {
        Ok(ctx.predict("judge", inputs).await?)
    }
}

pub fn judge_program() -> Arc<Program> {
    slow_judge_program(Duration::ZERO)
}

/// Judge program whose model takes `delay` per call
pub fn slow_judge_program(delay: Duration) -> Arc<Program> {
    let lm = MockLanguageModel::new(|req| {
        Ok(PredictResponse::new(json!({"label": req.instructions})))
    })
    .with_delay(delay);
    Arc::new(
        Program::builder(Arc::new(JudgeForward), Arc::new(lm))
            .predictor(
                "judge",
                Predictor::new(Signature::parse("ticket -> label").unwrap(), "Classify the ticket."),
            )
            .build()
            .unwrap(),
    )
}

pub fn exact_match() -> Arc<dyn Metric> {
    Arc::new(metric_fn(|call: MetricCall<'_>| {
        Ok(call.gold.get("label") == call.prediction.field("label"))
    }))
}

pub fn dataset() -> Vec<Example> {
    vec![
        Example::new().with("ticket", "can't log in").with("label", "account"),
        Example::new().with("ticket", "charged twice").with("label", "billing"),
    ]
}

/// Config running `sh -c <script>` as the optimizer, with work dirs under `root`
pub fn sh_config(root: &Path, script: &str) -> OptiglotConfig {
    let mut config = OptiglotConfig::default();
    config.optimizer = OptimizerSection {
        command: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string(), "optimizer".to_string()],
    };
    config.session.work_dir = Some(root.to_path_buf());
    config.session.shutdown_grace_ms = 100;
    config
}

/// Wait until the session reaches `Running`, returning the server port
#[allow(dead_code)]
pub async fn wait_until_running(rx: &mut broadcast::Receiver<SessionEvent>) -> u16 {
    let mut port = None;
    loop {
        match rx.recv().await.unwrap() {
            SessionEvent::StateChanged {
                to: SessionState::Listening { port: p },
                ..
            } => port = Some(p),
            SessionEvent::StateChanged {
                to: SessionState::Running,
                ..
            } => return port.unwrap(),
            _ => {}
        }
    }
}
