//! Operational handlers

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::EvalState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the server
    pub status: String,
    /// Server version
    pub version: String,
    /// Seconds since server started
    pub uptime_seconds: i64,
    /// Number of `evaluate` calls served
    pub evaluations: u64,
    /// Whether the optimizer has delivered its result
    pub finalized: bool,
}

/// Health check endpoint
pub async fn health(State(state): State<Arc<EvalState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        evaluations: state.evaluations(),
        finalized: state.is_finalized(),
    })
}
