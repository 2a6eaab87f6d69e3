//! Core value types shared across the optimization boundary.

use std::collections::BTreeMap;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One dataset record: an opaque mapping of field name to value.
///
/// Examples are read from the caller's dataset and never mutated by the
/// evaluator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Example(Map<String, Value>);

impl Example {
    /// Create an empty example
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style field insertion
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Look up a field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Look up a string field
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// Field names in this example
    pub fn fields(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the example has no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keep only the named fields, e.g. to strip labels before a rollout
    pub fn project(&self, fields: &[&str]) -> Self {
        self.0
            .iter()
            .filter(|(name, _)| fields.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

impl From<Map<String, Value>> for Example {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Example> for Value {
    fn from(example: Example) -> Self {
        Value::Object(example.0)
    }
}

impl FromIterator<(String, Value)> for Example {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A named set of instruction strings proposed for one round.
///
/// Keys are predictor names; values replace that predictor's instructions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Candidate(BTreeMap<String, String>);

impl Candidate {
    /// Create an empty candidate
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style entry insertion
    pub fn with(mut self, predictor: impl Into<String>, instructions: impl Into<String>) -> Self {
        self.0.insert(predictor.into(), instructions.into());
        self
    }

    /// Insert or replace the instructions for a predictor
    pub fn insert(&mut self, predictor: impl Into<String>, instructions: impl Into<String>) {
        self.0.insert(predictor.into(), instructions.into());
    }

    /// Instructions proposed for a predictor
    pub fn get(&self, predictor: &str) -> Option<&str> {
        self.0.get(predictor).map(String::as_str)
    }

    /// Iterate `(predictor, instructions)` pairs in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for Candidate {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, String>> for Candidate {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

/// Token consumption reported by the language model shim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

impl Add for Usage {
    type Output = Usage;

    fn add(self, rhs: Usage) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens + rhs.prompt_tokens,
            completion_tokens: self.completion_tokens + rhs.completion_tokens,
            total_tokens: self.total_tokens + rhs.total_tokens,
        }
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Usage) {
        *self = *self + rhs;
    }
}

impl Sum for Usage {
    fn sum<I: Iterator<Item = Usage>>(iter: I) -> Usage {
        iter.fold(Usage::default(), Add::add)
    }
}

/// Kind of model endpoint a predictor talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    #[default]
    Chat,
    Text,
    Responses,
}

/// Language model settings for a predictor or a whole batch.
///
/// The optimizer may send one with an `evaluate` request to vary sampling
/// between rounds (e.g. a fresh `rollout_id` with a higher temperature).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LmConfig {
    pub model: String,
    #[serde(default)]
    pub model_type: ModelType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout_id: Option<u64>,
}

impl LmConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            model_type: ModelType::default(),
            temperature: None,
            rollout_id: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_rollout_id(mut self, rollout_id: u64) -> Self {
        self.rollout_id = Some(rollout_id);
        self
    }
}
