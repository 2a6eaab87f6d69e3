//! Predictor state held by a program.

use serde::{Deserialize, Serialize};

use super::signature::Signature;
use crate::types::{Example, LmConfig};

/// State of one named predictor: what the optimizer tunes and what the shim needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predictor {
    pub signature: Signature,
    pub instructions: String,
    #[serde(default)]
    pub demos: Vec<Example>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lm: Option<LmConfig>,
}

impl Predictor {
    pub fn new(signature: Signature, instructions: impl Into<String>) -> Self {
        Self {
            signature,
            instructions: instructions.into(),
            demos: Vec::new(),
            lm: None,
        }
    }

    pub fn with_demos(mut self, demos: Vec<Example>) -> Self {
        self.demos = demos;
        self
    }

    pub fn with_lm(mut self, lm: LmConfig) -> Self {
        self.lm = Some(lm);
        self
    }
}
