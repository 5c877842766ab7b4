use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use predictor_core::PredictorError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{error, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Standard API error response structure
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Error type/code
    #[schema(example = "invalid_input")]
    pub error_type: String,
    /// Human-readable error message
    pub message: String,
    /// Field-specific validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<BTreeMap<String, Vec<String>>>,
    /// Timestamp when error occurred
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Suggested actions for resolving the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

/// Main API error enum
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid input: {message}")]
    Validation {
        message: String,
        field_errors: Option<BTreeMap<String, Vec<String>>>,
    },

    #[error("Prediction error: {message}")]
    Prediction { message: String },

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl ApiError {
    /// Create a simple validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field_errors: None,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Prediction { .. } => StatusCode::BAD_REQUEST,
            ApiError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type string
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "invalid_input",
            ApiError::Prediction { .. } => "prediction_error",
            ApiError::ServiceUnavailable { .. } => "service_unavailable",
            ApiError::Internal { .. } => "internal_error",
        }
    }

    /// Get suggested actions for resolving the error
    pub fn suggestions(&self) -> Option<Vec<String>> {
        match self {
            ApiError::Validation {
                field_errors: Some(_),
                ..
            } => Some(vec![
                "Correct the values listed in field_errors".to_string(),
            ]),
            ApiError::Validation { .. } => Some(vec![
                "Check the request body against the schema at /api-docs/openapi.json".to_string(),
            ]),
            ApiError::Prediction { .. } => Some(vec![
                "Check that categorical values match the levels the model was trained on"
                    .to_string(),
            ]),
            ApiError::ServiceUnavailable { .. } => Some(vec![
                "Check the model bundle path in the server configuration".to_string(),
                "Use the local fallback model until the service is restored".to_string(),
            ]),
            ApiError::Internal { .. } => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4().to_string();
        let status_code = self.status_code();

        // Log the error with correlation ID
        if status_code.is_server_error() {
            error!(
                error_id = %error_id,
                error_type = %self.error_type(),
                status_code = %status_code.as_u16(),
                error = %self,
                "API error occurred"
            );
        } else {
            warn!(
                error_id = %error_id,
                error_type = %self.error_type(),
                status_code = %status_code.as_u16(),
                "Request rejected"
            );
        }

        let suggestions = self.suggestions();
        let error_type = self.error_type().to_string();
        let message = self.to_string();
        let field_errors = match self {
            ApiError::Validation { field_errors, .. } => field_errors,
            _ => None,
        };

        let error_response = ApiErrorResponse {
            error_id,
            error_type,
            message,
            field_errors,
            timestamp: chrono::Utc::now(),
            suggestions,
        };

        (status_code, Json(error_response)).into_response()
    }
}

impl From<PredictorError> for ApiError {
    fn from(error: PredictorError) -> Self {
        match error {
            PredictorError::ServiceUnavailable { reason } => ApiError::ServiceUnavailable {
                message: format!("Model not loaded: {}", reason),
            },
            PredictorError::InvalidInput {
                message,
                field_errors,
            } => ApiError::Validation {
                message,
                field_errors: (!field_errors.is_empty()).then_some(field_errors),
            },
            PredictorError::Prediction(message) => ApiError::Prediction { message },
        }
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predictor_errors_map_to_status_codes() {
        let unavailable: ApiError = PredictorError::unavailable("missing file").into();
        assert_eq!(unavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(unavailable.error_type(), "service_unavailable");

        let prediction: ApiError = PredictorError::prediction("unknown category").into();
        assert_eq!(prediction.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(prediction.error_type(), "prediction_error");

        let mut fields = BTreeMap::new();
        fields.insert("Age".to_string(), vec!["out of range".to_string()]);
        let invalid: ApiError = PredictorError::invalid_fields(fields).into();
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
        assert!(matches!(
            invalid,
            ApiError::Validation { field_errors: Some(ref f), .. } if f.contains_key("Age")
        ));
    }

    #[test]
    fn test_validation_suggestions_follow_the_error() {
        let mut fields = BTreeMap::new();
        fields.insert("BMI".to_string(), vec!["must be positive".to_string()]);
        let per_field: ApiError = PredictorError::invalid_fields(fields).into();
        let suggestions = per_field.suggestions().unwrap();
        assert!(suggestions.iter().any(|s| s.contains("field_errors")));

        let shape = ApiError::validation("request body must be a JSON array of patient records");
        let suggestions = shape.suggestions().unwrap();
        assert!(suggestions.iter().all(|s| !s.contains("field_errors")));
        assert!(suggestions.iter().any(|s| s.contains("/api-docs/openapi.json")));
    }

    #[test]
    fn test_malformed_input_has_no_field_errors() {
        let err: ApiError = PredictorError::malformed("expected an object").into();
        assert!(matches!(err, ApiError::Validation { field_errors: None, .. }));
    }
}
