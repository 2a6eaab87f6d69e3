//! HTTP server module

mod api;
mod protocol;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::EvalState;

pub use api::HealthResponse;
pub use protocol::{
    ErrorResponse, EvaluateRequest, FinalizeRequest, MetricEntry, MetricRequest, MetricResponse,
    StatusResponse,
};

/// Create the HTTP router with all routes configured
pub fn create_router(state: Arc<EvalState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/evaluate", post(protocol::evaluate))
        .route("/metric", post(protocol::metric))
        .route("/finalize", post(protocol::finalize))
        .with_state(state)
}
