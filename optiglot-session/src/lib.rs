//! optiglot-session - run an external optimizer against a host program
//!
//! A session starts the evaluation server, writes the handoff artifacts,
//! spawns the optimizer and waits for it to finalize. Whatever the outcome,
//! the server is stopped, the process reaped and the work directory removed
//! unless artifacts are kept.

pub mod config;
mod error;
pub mod handoff;
pub mod process;
mod session;
mod state;

pub use config::{ConfigError, ConfigLoader, OptiglotConfig};
pub use error::SessionError;
pub use handoff::Handoff;
pub use session::OptimizationSession;
pub use state::{SessionEvent, SessionState};
