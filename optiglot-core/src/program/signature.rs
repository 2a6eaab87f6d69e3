//! Predictor signatures: the typed input and output fields of a predictor.

use serde::{Deserialize, Serialize};

/// JSON type of a signature field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

/// One named field of a signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    /// Label shown before the field in a prompt, e.g. `"Ticket:"`
    pub prefix: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            prefix: default_prefix(&name),
            name,
            field_type,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Ordered input and output fields of a predictor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub inputs: Vec<Field>,
    pub outputs: Vec<Field>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the `"a, b -> c"` shorthand; every field is a string
    pub fn parse(spec: &str) -> Option<Self> {
        let (inputs, outputs) = spec.split_once("->")?;
        let fields = |side: &str| -> Vec<Field> {
            side.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| Field::new(name, FieldType::String))
                .collect()
        };
        let signature = Self {
            inputs: fields(inputs),
            outputs: fields(outputs),
        };
        if signature.outputs.is_empty() {
            return None;
        }
        Some(signature)
    }

    pub fn input(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.inputs.push(Field::new(name, field_type));
        self
    }

    pub fn output(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.outputs.push(Field::new(name, field_type));
        self
    }

    pub fn input_names(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().map(|f| f.name.as_str())
    }

    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(|f| f.name.as_str())
    }
}

/// `"customer_ticket"` becomes `"Customer Ticket:"`
fn default_prefix(name: &str) -> String {
    let words: Vec<String> = name
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    format!("{}:", words.join(" "))
}
