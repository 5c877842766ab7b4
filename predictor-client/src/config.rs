use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8001";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

pub const API_URL_ENV: &str = "PREDICTOR_API_URL";
pub const TIMEOUT_MS_ENV: &str = "PREDICTOR_TIMEOUT_MS";
pub const LOCAL_MODEL_ENV: &str = "PREDICTOR_LOCAL_MODEL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the prediction service
    pub api_url: String,
    /// Timeout for the whole remote call
    pub timeout_ms: u64,
    /// Bundle used when the service cannot be reached
    pub local_model_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            local_model_path: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let api_url = std::env::var(API_URL_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let timeout_ms = std::env::var(TIMEOUT_MS_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        let local_model_path = std::env::var(LOCAL_MODEL_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Self {
            api_url,
            timeout_ms,
            local_model_path,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
