//! optiglot-server - HTTP server for the evaluation protocol
//!
//! The optimizer process drives a session through this server: it asks for
//! batches to be evaluated under candidate instructions, asks for already
//! produced predictions to be scored, and finally reports the winning
//! candidate. One server serves exactly one session.

mod error;
pub mod http;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use error::ServerError;
pub use http::create_router;
pub use state::{EvalState, FinalizeReceiver, FinalizeSender, finalize_channel};

/// The evaluation server for one optimization session
pub struct EvalServer {
    config: ServerConfig,
    state: Arc<EvalState>,
}

impl EvalServer {
    pub fn new(config: ServerConfig, state: Arc<EvalState>) -> Self {
        Self { config, state }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the shared state
    pub fn state(&self) -> Arc<EvalState> {
        Arc::clone(&self.state)
    }

    /// Bind the configured address and serve in a background task.
    ///
    /// Port 0 binds an ephemeral port; the returned handle knows the real one.
    pub async fn start(self) -> Result<RunningServer, ServerError> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                source: e,
            })?;
        self.start_with_listener(listener)
    }

    /// Serve on an already bound listener in a background task
    pub fn start_with_listener(self, listener: TcpListener) -> Result<RunningServer, ServerError> {
        let addr = listener
            .local_addr()
            .map_err(|e| ServerError::Internal(format!("listener has no local address: {}", e)))?;
        let shutdown = self.state.shutdown_token();
        let task = tokio::spawn(self.run_with_listener(listener, shutdown.clone()));

        tracing::info!("optiglot server listening on {}", addr);

        Ok(RunningServer {
            addr,
            shutdown,
            task,
        })
    }

    /// Serve until `shutdown` is cancelled, then drain in-flight requests
    pub async fn run_with_listener(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), ServerError> {
        let router = create_router(self.state);
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

/// Handle to a server running in the background
pub struct RunningServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<Result<(), ServerError>>,
}

impl RunningServer {
    /// The address actually bound
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL the optimizer calls back on
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting connections and give in-flight requests up to `drain`
    /// to finish. The server task is aborted if they take longer.
    pub async fn shutdown(mut self, drain: Duration) -> Result<(), ServerError> {
        self.shutdown.cancel();
        match tokio::time::timeout(drain, &mut self.task).await {
            Ok(joined) => {
                let result =
                    joined.map_err(|e| ServerError::Internal(format!("server task failed: {}", e)))?;
                tracing::debug!("optiglot server on {} stopped", self.addr);
                result
            }
            Err(_) => {
                tracing::warn!(
                    drain_ms = drain.as_millis() as u64,
                    "optiglot server on {} did not drain, aborting",
                    self.addr
                );
                self.task.abort();
                Ok(())
            }
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on; 0 picks an ephemeral port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
        }
    }
}

impl ServerConfig {
    /// Create a new ServerConfig with the specified host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns the socket address string (e.g., "127.0.0.1:7433")
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_support::echo_program;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 0);
    }

    #[test]
    fn test_server_config_addr() {
        let config = ServerConfig::new("127.0.0.1", 8080);
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[tokio::test]
    async fn start_on_port_zero_reports_real_port() {
        let (tx, _rx) = finalize_channel();
        let server = EvalServer::new(
            ServerConfig::default(),
            Arc::new(EvalState::new(echo_program(), tx)),
        );

        let running = server.start().await.unwrap();

        assert_ne!(running.addr().port(), 0);
        assert_eq!(running.url(), format!("http://127.0.0.1:{}", running.addr().port()));
        running.shutdown(Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();
        let (tx, _rx) = finalize_channel();
        let server = EvalServer::new(
            ServerConfig::new("127.0.0.1", port),
            Arc::new(EvalState::new(echo_program(), tx)),
        );

        let result = server.start().await;

        assert!(matches!(result, Err(ServerError::Bind { .. })));
    }
}
