use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Per-field validation messages, keyed by wire field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Errors produced by the prediction service
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictorError {
    /// The model bundle is not loaded; no prediction is possible
    #[error("Model not loaded: {reason}")]
    ServiceUnavailable { reason: String },

    /// The patient record violates the input schema
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        field_errors: FieldErrors,
    },

    /// The pipeline could not score otherwise well-formed input
    #[error("Prediction error: {0}")]
    Prediction(String),
}

impl PredictorError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            reason: reason.into(),
        }
    }

    pub fn prediction(message: impl Into<String>) -> Self {
        Self::Prediction(message.into())
    }

    /// Build an `InvalidInput` error naming every offending field.
    pub fn invalid_fields(field_errors: FieldErrors) -> Self {
        let fields: Vec<&str> = field_errors.keys().map(String::as_str).collect();
        Self::InvalidInput {
            message: format!("invalid value for {}", fields.join(", ")),
            field_errors,
        }
    }

    /// Build an `InvalidInput` error for a payload that could not be decoded at all.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field_errors: FieldErrors::new(),
        }
    }

    /// Stable error kind string used on the wire
    pub fn error_type(&self) -> &'static str {
        match self {
            PredictorError::ServiceUnavailable { .. } => "service_unavailable",
            PredictorError::InvalidInput { .. } => "invalid_input",
            PredictorError::Prediction(_) => "prediction_error",
        }
    }
}

/// Errors raised while loading or validating a model bundle artifact
#[derive(Error, Debug)]
pub enum BundleError {
    #[error("Failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unsupported artifact format version {0}")]
    UnsupportedVersion(u32),

    #[error("Inconsistent model artifact: {0}")]
    Invalid(String),
}

pub type PredictorResult<T> = Result<T, PredictorError>;
