//! Session context recorded on spans.
//!
//! This module provides:
//! - `TraceContext` for carrying session identity through spans
//! - `OptiglotSpanExt` for recording that context on a span
//! - Standard attribute names for consistent telemetry

use std::fmt;

/// Standard attribute names for optiglot telemetry.
///
/// These follow the `optiglot.` namespace convention. A span only accepts a
/// recorded value for fields it declared, so spans that want session context
/// declare these as `tracing::field::Empty`.
pub mod attributes {
    pub const SESSION_ID: &str = "optiglot.session_id";
    pub const ALGORITHM: &str = "optiglot.algorithm";
    pub const PORT: &str = "optiglot.port";
}

/// Session identifier for tracing context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trace context carrying session attributes.
#[derive(Debug, Clone, Default)]
pub struct TraceContext {
    pub session_id: Option<SessionId>,
    pub algorithm: Option<String>,
    pub port: Option<u16>,
}

impl TraceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create context for a session.
    pub fn for_session(session_id: SessionId) -> Self {
        Self {
            session_id: Some(session_id),
            ..Default::default()
        }
    }

    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = Some(algorithm.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Record this context on the current span.
    pub fn record_on_span(&self) {
        tracing::Span::current().record_optiglot_context(self);
    }
}

/// Extension trait for `tracing::Span` to record optiglot context.
pub trait OptiglotSpanExt {
    fn record_optiglot_context(&self, ctx: &TraceContext);
}

impl OptiglotSpanExt for tracing::Span {
    fn record_optiglot_context(&self, ctx: &TraceContext) {
        if let Some(session_id) = &ctx.session_id {
            self.record(attributes::SESSION_ID, session_id.as_str());
        }
        if let Some(algorithm) = &ctx.algorithm {
            self.record(attributes::ALGORITHM, algorithm.as_str());
        }
        if let Some(port) = ctx.port {
            self.record(attributes::PORT, port);
        }
    }
}
