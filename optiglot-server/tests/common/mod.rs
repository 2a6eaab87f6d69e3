//! Shared test utilities for optiglot-server integration tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use optiglot_core::{
    Example, Forward, ForwardError, MetricCall, MockLanguageModel, PredictResponse, Predictor,
    Program, RolloutContext, Signature, metric_fn,
};
use optiglot_server::{
    EvalServer, EvalState, FinalizeReceiver, RunningServer, ServerConfig, finalize_channel,
};
use serde_json::{Value, json};

/// Routes the example through `judge` and returns its output.
pub struct JudgeForward;

#[async_trait]
impl Forward for JudgeForward {
    async fn forward(&self, ctx: &RolloutContext, inputs: Example) -> Result<Value, ForwardError> {
        Ok(ctx.predict("judge", inputs).await?)
    }
}

/// Program whose model answers with the instructions it was given, after `delay`
#[allow(dead_code)]
pub fn instruction_echo_program(delay: Duration) -> Arc<Program> {
    let lm = MockLanguageModel::new(|req| {
        Ok(PredictResponse::new(json!({"instructions": req.instructions})))
    })
    .with_delay(delay);
    Arc::new(
        Program::builder(Arc::new(JudgeForward), Arc::new(lm))
            .predictor(
                "judge",
                Predictor::new(Signature::parse("ticket -> label").unwrap(), "seed"),
            )
            .build()
            .unwrap(),
    )
}

/// Starts a server with a constant-score metric, returns its handle and completion signal
#[allow(dead_code)]
pub async fn start_test_server(program: Arc<Program>) -> (RunningServer, Arc<EvalState>, FinalizeReceiver) {
    let (tx, rx) = finalize_channel();
    let state = Arc::new(
        EvalState::new(program, tx)
            .with_metric(Arc::new(metric_fn(|_: MetricCall<'_>| Ok(1.0))))
            .with_concurrency(4),
    );
    let server = EvalServer::new(ServerConfig::default(), Arc::clone(&state));
    let running = server.start().await.unwrap();
    (running, state, rx)
}
