use anyhow::{Context, Result};
use config::{Config, Environment, File};
use logger_redacted::LogFormat;
use predictor_core::PredictionService;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration file read when none is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "predictor-server.yaml";

/// Prefix of environment variables overriding configuration keys
pub const ENV_PREFIX: &str = "PREDICTOR";

/// Shared server state handed to every handler
#[derive(Debug, Clone)]
pub struct PredictorServer {
    config: Arc<ServerConfig>,
    service: PredictionService,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server name
    pub name: String,
    /// Bind address
    pub host: String,
    pub port: u16,
    /// Location of the model bundle artifact
    pub model_path: PathBuf,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "COVID Hospitalization Predictor".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8001,
            model_path: PathBuf::from("random_forest_pipeline.json"),
            request_timeout_secs: 30,
            log_format: LogFormat::Pretty,
        }
    }
}

impl ServerConfig {
    /// Layer defaults, the optional YAML file at `path` and `PREDICTOR_*`
    /// environment variables, later sources winning.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be parsed or a value has the
    /// wrong type.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        settings
            .try_deserialize()
            .context("Invalid server configuration")
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl PredictorServer {
    pub fn new(config: ServerConfig, service: PredictionService) -> Self {
        Self {
            config: Arc::new(config),
            service,
        }
    }

    /// Load the bundle named by the configuration. A bundle that fails to
    /// load leaves the server running in the unavailable state.
    pub fn from_config(config: ServerConfig) -> Self {
        let service = PredictionService::load(&config.model_path);
        Self::new(config, service)
    }

    /// Get server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn service(&self) -> &PredictionService {
        &self.service
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = ServerConfig::load("/nonexistent/predictor-server.yaml").unwrap();
        assert_eq!(config.port, ServerConfig::default().port);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_yaml_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "port: 9100\nmodel_path: /models/forest.json\nlog_format: json").unwrap();

        let config = ServerConfig::load(file.path()).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.model_path, PathBuf::from("/models/forest.json"));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.bind_address(), "0.0.0.0:9100");
    }

    #[test]
    fn test_server_without_bundle_is_unavailable() {
        let config = ServerConfig {
            model_path: PathBuf::from("/nonexistent/forest.json"),
            ..ServerConfig::default()
        };
        let server = PredictorServer::from_config(config);
        assert!(!server.service().is_loaded());
    }
}
