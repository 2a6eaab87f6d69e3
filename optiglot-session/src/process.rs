//! Optimizer process spawning and reaping

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::SessionError;
use crate::config::OptimizerSection;

/// Environment variable carrying the callback URL, for optimizers that read it
pub const HOST_URL_ENV: &str = "HOST_URL";

/// Spawn `<command> <args..> --port <port> --config <path>`.
///
/// Output is inherited so the optimizer's logs show up next to ours. The
/// child is killed if its handle is dropped.
pub fn spawn_optimizer(
    optimizer: &OptimizerSection,
    port: u16,
    config_path: &Path,
    callback_url: &str,
) -> Result<Child, SessionError> {
    let mut cmd = Command::new(&optimizer.command);
    cmd.args(&optimizer.args)
        .arg("--port")
        .arg(port.to_string())
        .arg("--config")
        .arg(config_path)
        .env(HOST_URL_ENV, callback_url)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| SessionError::SpawnFailed {
        command: optimizer.command.clone(),
        source: e,
    })?;

    info!(
        command = %optimizer.command,
        pid = child.id(),
        "Spawned optimizer"
    );
    Ok(child)
}

/// Give the optimizer `grace` to exit on its own, then kill it
pub async fn reap(child: &mut Child, grace: Duration) {
    match child.try_wait() {
        Ok(Some(status)) => {
            debug!(%status, "Optimizer already exited");
            return;
        }
        Ok(None) => {}
        Err(e) => warn!("Failed to poll optimizer: {}", e),
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => debug!(%status, "Optimizer exited"),
        Ok(Err(e)) => warn!("Failed to wait for optimizer: {}", e),
        Err(_) => {
            warn!(grace_ms = grace.as_millis() as u64, "Optimizer still running, killing it");
            if let Err(e) = child.kill().await {
                warn!("Failed to kill optimizer: {}", e);
            }
        }
    }
}
