//! Session lifecycle against shell-script optimizers

mod common;

use std::net::TcpStream;
use std::time::{Duration, Instant};

use optiglot_session::{Handoff, OptimizationSession, SessionError, SessionEvent, SessionState};
use serde_json::{Value, json};
use tempfile::TempDir;

#[tokio::test]
async fn finalize_applies_winning_candidate() {
    let root = TempDir::new().unwrap();
    let session = OptimizationSession::new(common::sh_config(root.path(), "exec sleep 30"));
    let mut rx = session.subscribe();
    let program = common::judge_program();

    let optimizer = async {
        let port = common::wait_until_running(&mut rx).await;
        let client = reqwest::Client::new();
        let base = format!("http://127.0.0.1:{}", port);

        let report: Value = client
            .post(format!("{}/evaluate", base))
            .json(&json!({
                "batch": [{"ticket": "can't log in", "label": "account"}],
                "candidate": {"judge": "account"},
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(report["scores"][0]["score"], json!(1.0));

        client
            .post(format!("{}/finalize", base))
            .json(&json!({"best_candidate": {"judge": "account"}, "results": {"best_score": 1.0}}))
            .send()
            .await
            .unwrap();
    };
    let (result, ()) = tokio::join!(
        session.compile(program, common::exact_match(), common::dataset()),
        optimizer,
    );

    let program = result.unwrap();
    assert_eq!(program.instructions().get("judge"), Some("account"));
    assert_eq!(session.results(), Some(json!({"best_score": 1.0})));
    assert_eq!(session.state().await, SessionState::TornDown);
    assert!(!session.work_dir().exists());
}

#[tokio::test]
async fn missing_optimizer_is_spawn_failure() {
    let root = TempDir::new().unwrap();
    let mut config = common::sh_config(root.path(), "exit 0");
    config.optimizer.command = "optiglot-no-such-optimizer".to_string();
    let session = OptimizationSession::new(config);
    let program = common::judge_program();

    let result = session
        .compile(program.clone(), common::exact_match(), common::dataset())
        .await;

    assert!(matches!(result, Err(SessionError::SpawnFailed { .. })));
    assert!(matches!(session.state().await, SessionState::SpawnFailed { .. }));
    assert_eq!(program.instructions().get("judge"), Some("Classify the ticket."));
    assert!(!session.work_dir().exists());
}

#[tokio::test]
async fn failing_optimizer_stops_the_server() {
    let root = TempDir::new().unwrap();
    let session = OptimizationSession::new(common::sh_config(root.path(), "exit 3"));
    let mut rx = session.subscribe();

    let result = session
        .compile(common::judge_program(), common::exact_match(), common::dataset())
        .await;

    assert!(matches!(result, Err(SessionError::ProcessFailed { code: Some(3) })));
    assert_eq!(session.state().await, SessionState::ProcessFailed { code: Some(3) });

    let mut port = None;
    while let Ok(event) = rx.try_recv() {
        if let SessionEvent::StateChanged {
            to: SessionState::Listening { port: p },
            ..
        } = event
        {
            port = Some(p);
        }
    }
    let port = port.unwrap();
    assert!(TcpStream::connect(("127.0.0.1", port)).is_err());
}

#[tokio::test]
async fn clean_exit_without_finalize_is_an_error() {
    let root = TempDir::new().unwrap();
    let session = OptimizationSession::new(common::sh_config(root.path(), "exit 0"));

    let result = session
        .compile(common::judge_program(), common::exact_match(), common::dataset())
        .await;

    assert!(matches!(result, Err(SessionError::ExitedWithoutResult)));
    assert_eq!(session.state().await, SessionState::ExitedWithoutResult);
    assert!(session.results().is_none());
}

#[tokio::test]
async fn slow_optimizer_times_out_and_is_killed() {
    let root = TempDir::new().unwrap();
    let mut config = common::sh_config(root.path(), "exec sleep 30");
    config.session.timeout_secs = Some(1);
    let session = OptimizationSession::new(config);

    let started = Instant::now();
    let result = session
        .compile(common::judge_program(), common::exact_match(), common::dataset())
        .await;

    assert!(matches!(result, Err(SessionError::TimedOut(_))));
    assert_eq!(session.state().await, SessionState::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn kept_artifacts_describe_the_session() {
    let root = TempDir::new().unwrap();
    let mut config = common::sh_config(root.path(), "test -f \"$4\" && exit 0 || exit 7");
    config.session.keep_artifacts = true;
    config.options.insert("max_metric_calls".to_string(), json!(50));
    let session = OptimizationSession::new(config)
        .with_valset(vec![optiglot_core::Example::new().with("ticket", "refund")]);
    let mut rx = session.subscribe();

    let result = session
        .compile(common::judge_program(), common::exact_match(), common::dataset())
        .await;

    // The script saw its --config file and exited cleanly without finalizing.
    assert!(matches!(result, Err(SessionError::ExitedWithoutResult)));

    let handoff = Handoff::read(&session.work_dir().join("config.json")).unwrap();
    assert_eq!(handoff.algorithm, "gepa");
    assert_eq!(handoff.seed_candidate.get("judge"), Some("Classify the ticket."));
    assert_eq!(handoff.callback_url, format!("http://127.0.0.1:{}", handoff.port));
    assert_eq!(handoff.options["max_metric_calls"], json!(50));
    assert!(handoff.program.named_predictors.contains_key("judge"));
    assert!(handoff.dataset_path.exists());
    assert!(handoff.valset_path.unwrap().exists());

    let mut kept = None;
    while let Ok(event) = rx.try_recv() {
        if let SessionEvent::TornDown { artifacts } = event {
            kept = artifacts;
        }
    }
    assert_eq!(kept.as_deref(), Some(session.work_dir()));
}

#[tokio::test]
async fn session_runs_only_once() {
    let root = TempDir::new().unwrap();
    let session = OptimizationSession::new(common::sh_config(root.path(), "exit 0"));

    let _ = session
        .compile(common::judge_program(), common::exact_match(), common::dataset())
        .await;
    let second = session
        .compile(common::judge_program(), common::exact_match(), common::dataset())
        .await;

    assert!(matches!(second, Err(SessionError::AlreadyStarted)));
}

#[tokio::test]
async fn timeout_is_not_held_up_by_in_flight_batch() {
    let root = TempDir::new().unwrap();
    let mut config = common::sh_config(root.path(), "exec sleep 60");
    config.session.timeout_secs = Some(1);
    let session = OptimizationSession::new(config);
    let mut rx = session.subscribe();
    let program = common::slow_judge_program(Duration::from_secs(20));

    let optimizer = async {
        let port = common::wait_until_running(&mut rx).await;
        // Fire and forget: the batch is still running when the timeout hits.
        tokio::spawn(async move {
            reqwest::Client::new()
                .post(format!("http://127.0.0.1:{}/evaluate", port))
                .json(&json!({"batch": [{"ticket": "x"}], "candidate": {"judge": "slow"}}))
                .send()
                .await
        })
    };
    let started = Instant::now();
    let (result, in_flight) = tokio::join!(
        session.compile(program, common::exact_match(), common::dataset()),
        optimizer,
    );

    assert!(matches!(result, Err(SessionError::TimedOut(_))));
    assert!(
        started.elapsed() < Duration::from_secs(8),
        "compile took {:?}",
        started.elapsed()
    );
    if let Ok(response) = in_flight.await.unwrap() {
        assert!(!response.status().is_success());
    }
}

#[tokio::test]
async fn concurrent_compile_claims_session_once() {
    let root = TempDir::new().unwrap();
    let session = OptimizationSession::new(common::sh_config(root.path(), "exit 0"));

    let (a, b) = tokio::join!(
        session.compile(common::judge_program(), common::exact_match(), common::dataset()),
        session.compile(common::judge_program(), common::exact_match(), common::dataset()),
    );

    let already_started = [&a, &b]
        .iter()
        .filter(|r| matches!(r, Err(SessionError::AlreadyStarted)))
        .count();
    assert_eq!(already_started, 1);
    assert_eq!(session.state().await, SessionState::ExitedWithoutResult);
}

#[tokio::test]
async fn setup_failure_ends_in_failed_state() {
    let root = TempDir::new().unwrap();
    let occupied = root.path().join("not-a-dir");
    std::fs::write(&occupied, "").unwrap();
    let session = OptimizationSession::new(common::sh_config(&occupied, "exit 0"));

    let result = session
        .compile(common::judge_program(), common::exact_match(), common::dataset())
        .await;

    assert!(matches!(result, Err(SessionError::WorkDir(_))));
    let state = session.state().await;
    assert!(matches!(state, SessionState::Failed { .. }));
    assert!(state.is_terminal());
}
