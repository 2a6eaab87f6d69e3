//! The host program: forward logic plus a typed registry of named predictors.
//!
//! Predictors are addressed by name through [`Program`]; candidates from the
//! optimizer replace their instructions in place. Every batch runs against an
//! immutable [`ProgramSnapshot`] taken while the candidate is applied, so no
//! rollout ever sees a half-applied candidate.

mod predictor;
mod signature;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub use predictor::Predictor;
pub use signature::{Field, FieldType, Signature};

use crate::error::{ForwardError, ProgramError};
use crate::lm::LanguageModel;
use crate::rollout::RolloutContext;
use crate::types::{Candidate, Example};

/// Host forward logic for one example.
///
/// Implementations call predictors through `ctx.predict(..)`; each call is
/// recorded in that rollout's trace.
#[async_trait]
pub trait Forward: Send + Sync {
    async fn forward(&self, ctx: &RolloutContext, inputs: Example) -> Result<Value, ForwardError>;
}

/// Immutable view of all predictors, shared by the rollouts of one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramSnapshot {
    pub named_predictors: BTreeMap<String, Predictor>,
}

impl ProgramSnapshot {
    pub fn get(&self, name: &str) -> Option<&Predictor> {
        self.named_predictors.get(name)
    }

    /// Current instructions of every predictor
    pub fn instructions(&self) -> Candidate {
        self.named_predictors
            .iter()
            .map(|(name, p)| (name.clone(), p.instructions.clone()))
            .collect()
    }
}

/// A host program whose predictor instructions can be optimized.
pub struct Program {
    predictors: RwLock<BTreeMap<String, Predictor>>,
    forward: Arc<dyn Forward>,
    lm: Arc<dyn LanguageModel>,
}

impl Program {
    /// Start building a program from its forward logic and model shim
    pub fn builder(forward: Arc<dyn Forward>, lm: Arc<dyn LanguageModel>) -> ProgramBuilder {
        ProgramBuilder {
            predictors: Vec::new(),
            forward,
            lm,
        }
    }

    pub fn forward(&self) -> Arc<dyn Forward> {
        Arc::clone(&self.forward)
    }

    pub fn lm(&self) -> Arc<dyn LanguageModel> {
        Arc::clone(&self.lm)
    }

    /// Names of all predictors in name order
    pub fn predictor_names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Clone of a single predictor's state
    pub fn predictor(&self, name: &str) -> Option<Predictor> {
        self.read().get(name).cloned()
    }

    /// Current instructions of every predictor; used as the seed candidate
    pub fn instructions(&self) -> Candidate {
        self.read()
            .iter()
            .map(|(name, p)| (name.clone(), p.instructions.clone()))
            .collect()
    }

    /// Replace instructions for every predictor named in `candidate`.
    ///
    /// Unknown names are ignored. Returns how many predictors were updated.
    pub fn apply_candidate(&self, candidate: &Candidate) -> usize {
        let mut predictors = self.write();
        apply(&mut predictors, candidate)
    }

    /// Apply `candidate` and take a snapshot under the same write guard.
    pub fn apply_and_snapshot(&self, candidate: &Candidate) -> (usize, Arc<ProgramSnapshot>) {
        let mut predictors = self.write();
        let applied = apply(&mut predictors, candidate);
        let snapshot = ProgramSnapshot {
            named_predictors: predictors.clone(),
        };
        (applied, Arc::new(snapshot))
    }

    /// Snapshot of the current predictor state
    pub fn snapshot(&self) -> Arc<ProgramSnapshot> {
        Arc::new(ProgramSnapshot {
            named_predictors: self.read().clone(),
        })
    }

    /// Write current instructions as a flat `{name: instructions}` JSON object
    pub fn save_instructions(&self, path: impl AsRef<Path>) -> Result<(), ProgramError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.instructions()).map_err(|e| {
            ProgramError::Format {
                path: path.to_path_buf(),
                source: e,
            }
        })?;
        std::fs::write(path, json).map_err(|e| ProgramError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load a flat instructions file and apply it like a candidate
    pub fn load_instructions(&self, path: impl AsRef<Path>) -> Result<usize, ProgramError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ProgramError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let candidate: Candidate =
            serde_json::from_str(&contents).map_err(|e| ProgramError::Format {
                path: path.to_path_buf(),
                source: e,
            })?;
        Ok(self.apply_candidate(&candidate))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Predictor>> {
        self.predictors.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Predictor>> {
        self.predictors.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("predictors", &self.predictor_names())
            .finish()
    }
}

fn apply(predictors: &mut BTreeMap<String, Predictor>, candidate: &Candidate) -> usize {
    let mut applied = 0;
    for (name, instructions) in candidate.iter() {
        match predictors.get_mut(name) {
            Some(predictor) => {
                predictor.instructions = instructions.clone();
                applied += 1;
            }
            None => debug!(predictor = %name, "Ignoring candidate entry for unknown predictor"),
        }
    }
    applied
}

/// Builder for [`Program`]
pub struct ProgramBuilder {
    predictors: Vec<(String, Predictor)>,
    forward: Arc<dyn Forward>,
    lm: Arc<dyn LanguageModel>,
}

impl ProgramBuilder {
    /// Register a named predictor
    pub fn predictor(mut self, name: impl Into<String>, predictor: Predictor) -> Self {
        self.predictors.push((name.into(), predictor));
        self
    }

    pub fn build(self) -> Result<Program, ProgramError> {
        let mut predictors = BTreeMap::new();
        for (name, predictor) in self.predictors {
            if predictors.contains_key(&name) {
                return Err(ProgramError::DuplicatePredictor(name));
            }
            predictors.insert(name, predictor);
        }
        Ok(Program {
            predictors: RwLock::new(predictors),
            forward: self.forward,
            lm: self.lm,
        })
    }
}
