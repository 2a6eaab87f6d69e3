//! Error types for optiglot-core

use std::path::PathBuf;

use thiserror::Error;

use crate::prediction::{FailureDescriptor, FailureKind};

/// Failures signaled by the predictor shim for a single predictor call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictorError {
    #[error("Unknown predictor: {0}")]
    UnknownPredictor(String),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        detail: Option<String>,
    },

    #[error("Parse error: {message}")]
    Parse {
        message: String,
        detail: Option<String>,
    },

    #[error("Model error: {message}")]
    Model {
        message: String,
        detail: Option<String>,
    },
}

impl PredictorError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            detail: None,
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            detail: None,
        }
    }

    pub fn model(message: impl Into<String>) -> Self {
        Self::Model {
            message: message.into(),
            detail: None,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            PredictorError::UnknownPredictor(_) => FailureKind::UnknownPredictor,
            PredictorError::Validation { .. } => FailureKind::ValidationError,
            PredictorError::Parse { .. } => FailureKind::ParseError,
            PredictorError::Model { .. } => FailureKind::ModelError,
        }
    }

    pub fn to_descriptor(&self) -> FailureDescriptor {
        let (message, detail) = match self {
            PredictorError::UnknownPredictor(name) => {
                (format!("no predictor named '{}'", name), None)
            }
            PredictorError::Validation { message, detail }
            | PredictorError::Parse { message, detail }
            | PredictorError::Model { message, detail } => (message.clone(), detail.clone()),
        };
        FailureDescriptor {
            kind: self.kind(),
            message,
            detail,
        }
    }
}

/// Errors returned by host forward logic
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error(transparent)]
    Predictor(#[from] PredictorError),

    #[error("Host error: {message}")]
    Host {
        message: String,
        detail: Option<String>,
    },
}

impl ForwardError {
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host {
            message: message.into(),
            detail: None,
        }
    }

    pub fn to_descriptor(&self) -> FailureDescriptor {
        match self {
            ForwardError::Predictor(e) => e.to_descriptor(),
            ForwardError::Host { message, detail } => FailureDescriptor {
                kind: FailureKind::HostError,
                message: message.clone(),
                detail: detail.clone(),
            },
        }
    }
}

impl From<serde_json::Error> for ForwardError {
    fn from(e: serde_json::Error) -> Self {
        ForwardError::host(e.to_string())
    }
}

/// Errors raised by a scoring function
#[derive(Error, Debug)]
pub enum MetricError {
    #[error("Metric failed: {0}")]
    Failed(String),

    #[error("Prediction is missing field '{0}'")]
    MissingField(String),
}

impl MetricError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Errors from building a program or persisting its instructions
#[derive(Error, Debug)]
pub enum ProgramError {
    #[error("Duplicate predictor: {0}")]
    DuplicatePredictor(String),

    #[error("Failed to access instructions file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid instructions file {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
