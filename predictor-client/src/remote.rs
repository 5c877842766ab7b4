use async_trait::async_trait;
use predictor_core::{PatientRecord, PredictionResult};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::RemoteError;

/// Remote prediction endpoint
#[async_trait]
pub trait RemotePredictor: Send + Sync {
    /// Submit one validated record. Exactly one attempt is made.
    async fn predict(&self, record: &PatientRecord) -> Result<PredictionResult, RemoteError>;
}

/// `RemotePredictor` over the service's HTTP API
#[derive(Debug, Clone)]
pub struct HttpPredictionClient {
    client: reqwest::Client,
    predict_url: String,
}

impl HttpPredictionClient {
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be constructed.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Unexpected(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            predict_url: format!("{}/predict", base_url.trim_end_matches('/')),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, RemoteError> {
        Self::new(&config.api_url, config.timeout())
    }

    pub fn predict_url(&self) -> &str {
        &self.predict_url
    }
}

#[async_trait]
impl RemotePredictor for HttpPredictionClient {
    async fn predict(&self, record: &PatientRecord) -> Result<PredictionResult, RemoteError> {
        debug!(url = %self.predict_url, "Submitting record to prediction service");

        let response = self
            .client
            .post(&self.predict_url)
            .json(record)
            .send()
            .await
            .map_err(|e| classify(e, "request failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(service_error(status, &body));
        }

        response
            .json::<PredictionResult>()
            .await
            .map_err(|e| classify(e, "malformed prediction response"))
    }
}

/// Connection failures and timeouts are connectivity problems; anything
/// else is unexpected.
fn classify(error: reqwest::Error, context: &str) -> RemoteError {
    if error.is_connect() || error.is_timeout() {
        RemoteError::Connectivity(error.to_string())
    } else {
        RemoteError::Unexpected(format!("{}: {}", context, error))
    }
}

/// Build a service error from an error response, reading the structured
/// body when there is one.
fn service_error(status: StatusCode, body: &str) -> RemoteError {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let field = |name: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };

    RemoteError::Service {
        status: status.as_u16(),
        error_type: field("error_type").unwrap_or_else(|| format!("http_{}", status.as_u16())),
        message: field("message")
            .or_else(|| field("detail"))
            .unwrap_or_else(|| body.trim().to_string()),
    }
}
