//! Logging and tracing setup for optiglot.
//!
//! This crate provides:
//! - `init_tracing` to install the global subscriber (pretty or JSON output)
//! - Standard `optiglot.*` span attribute names
//! - `TraceContext` for recording session identity on spans

pub mod context;
pub mod subscriber;

pub use context::{OptiglotSpanExt, SessionId, TraceContext, attributes};
pub use subscriber::{LogConfig, LogFormat, ObserveError, init_tracing};
