use predictor_core::PredictorError;
use thiserror::Error;

/// Failure of a single call to the remote prediction service
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// The service could not be reached or did not answer in time
    #[error("prediction service unreachable: {0}")]
    Connectivity(String),

    /// The service answered with a non-success status
    #[error("prediction service returned {status} ({error_type}): {message}")]
    Service {
        status: u16,
        error_type: String,
        message: String,
    },

    #[error("unexpected response from prediction service: {0}")]
    Unexpected(String),
}

/// Errors surfaced to callers of the client adapter
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid patient record: {0}")]
    InvalidInput(PredictorError),

    #[error("Prediction service error ({status}, {error_type}): {message}")]
    Service {
        status: u16,
        error_type: String,
        message: String,
    },

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    /// Neither the service nor a local model could produce a prediction
    #[error("No prediction capability: service unreachable ({remote}); local model unavailable ({local})")]
    FallbackUnavailable { remote: String, local: String },

    #[error("Local prediction failed: {0}")]
    LocalPrediction(PredictorError),
}

impl ClientError {
    /// Stable classification used in CLI output
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::InvalidInput(_) => "invalid_input",
            ClientError::Service { .. } => "service_error",
            ClientError::Unexpected(_) => "unexpected",
            ClientError::FallbackUnavailable { .. } => "fallback_unavailable",
            ClientError::LocalPrediction(_) => "local_prediction_error",
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
