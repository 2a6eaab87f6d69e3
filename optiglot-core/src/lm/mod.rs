//! Language model shim boundary
//!
//! The shim performs the actual model invocation for one predictor call.
//! Real implementations live in the host application; [`MockLanguageModel`]
//! scripts responses for tests.

mod mock;
mod traits;

pub use mock::MockLanguageModel;
pub use traits::{LanguageModel, PredictRequest, PredictResponse};
