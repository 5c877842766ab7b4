use predictor_core::{ModelBundle, PatientRecord, PatientRecordInput, PredictionResult, PredictionService};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult, RemoteError};
use crate::remote::{HttpPredictionClient, RemotePredictor};

/// Which path produced a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
    Remote,
    LocalFallback,
}

/// A prediction together with the path that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    #[serde(flatten)]
    pub result: PredictionResult,
    pub source: PredictionSource,
}

/// Lazily loaded local model used when the service is unreachable.
///
/// A successful load is kept for the life of the value; a failed load is
/// retried on the next fallback.
#[derive(Debug, Default)]
pub struct LocalFallback {
    path: Option<PathBuf>,
    service: OnceCell<PredictionService>,
}

impl LocalFallback {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            service: OnceCell::new(),
        }
    }

    /// A fallback backed by an already loaded service
    pub fn from_service(service: PredictionService) -> Self {
        Self {
            path: None,
            service: OnceCell::from(service),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.service.initialized()
    }

    async fn service(&self) -> Result<&PredictionService, String> {
        self.service
            .get_or_try_init(|| async {
                let path = self
                    .path
                    .clone()
                    .ok_or_else(|| "no local model configured".to_string())?;
                info!(path = %path.display(), "Loading local model bundle");
                let bundle = tokio::task::spawn_blocking(move || ModelBundle::load(&path))
                    .await
                    .map_err(|e| format!("model loading task failed: {}", e))?
                    .map_err(|e| e.to_string())?;
                Ok(PredictionService::new(bundle))
            })
            .await
    }
}

/// Client-side prediction entry point: remote service first, local model
/// when the service cannot be reached.
#[derive(Debug)]
pub struct ClientAdapter<R = HttpPredictionClient> {
    remote: R,
    local: LocalFallback,
}

impl ClientAdapter<HttpPredictionClient> {
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        let remote = HttpPredictionClient::from_config(config).map_err(|e| ClientError::Unexpected(e.to_string()))?;
        Ok(Self::new(remote, LocalFallback::new(config.local_model_path.clone())))
    }
}

impl<R: RemotePredictor> ClientAdapter<R> {
    pub fn new(remote: R, local: LocalFallback) -> Self {
        Self { remote, local }
    }

    pub fn local(&self) -> &LocalFallback {
        &self.local
    }

    /// Validate `input`, then predict it.
    ///
    /// # Errors
    ///
    /// `InvalidInput` before any network call when validation fails;
    /// otherwise as [`ClientAdapter::predict`].
    pub async fn predict_input(&self, input: &PatientRecordInput) -> ClientResult<Prediction> {
        let record = input.validate().map_err(ClientError::InvalidInput)?;
        self.predict(&record).await
    }

    /// Predict a validated record.
    ///
    /// # Errors
    ///
    /// - `Service` when the service answers with an error status (no fallback)
    /// - `Unexpected` for malformed responses (no fallback)
    /// - `FallbackUnavailable` when the service is unreachable and no local
    ///   model can be loaded
    /// - `LocalPrediction` when the local model cannot score the record
    pub async fn predict(&self, record: &PatientRecord) -> ClientResult<Prediction> {
        match self.remote.predict(record).await {
            Ok(result) => Ok(Prediction {
                result,
                source: PredictionSource::Remote,
            }),
            Err(RemoteError::Connectivity(reason)) => {
                warn!(reason = %reason, "Prediction service unreachable, using local model");
                self.predict_locally(record, reason).await
            }
            Err(RemoteError::Service {
                status,
                error_type,
                message,
            }) => Err(ClientError::Service {
                status,
                error_type,
                message,
            }),
            Err(RemoteError::Unexpected(message)) => Err(ClientError::Unexpected(message)),
        }
    }

    async fn predict_locally(&self, record: &PatientRecord, remote: String) -> ClientResult<Prediction> {
        let service = self
            .local
            .service()
            .await
            .map_err(|local| ClientError::FallbackUnavailable { remote, local })?;

        let result = service
            .predict_record(record)
            .map_err(ClientError::LocalPrediction)?;

        Ok(Prediction {
            result,
            source: PredictionSource::LocalFallback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok, block_on};

    #[derive(Debug, Default)]
    struct CountingRemote {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RemotePredictor for CountingRemote {
        async fn predict(&self, _record: &PatientRecord) -> Result<PredictionResult, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(RemoteError::Connectivity("connection refused".to_string()))
        }
    }

    fn demo_bundle() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../models/covid_forest.json")
    }

    #[test]
    fn test_failed_local_load_is_not_memoized() {
        let fallback = LocalFallback::new(Some(PathBuf::from("/nonexistent/forest.json")));
        assert_err!(block_on(fallback.service()));
        assert!(!fallback.is_loaded());
        assert_err!(block_on(fallback.service()));
    }

    #[test]
    fn test_successful_local_load_is_memoized() {
        let fallback = LocalFallback::new(Some(demo_bundle()));
        let first = assert_ok!(block_on(fallback.service())) as *const PredictionService;
        let second = assert_ok!(block_on(fallback.service())) as *const PredictionService;
        assert!(fallback.is_loaded());
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_input_makes_no_remote_call() {
        let adapter = ClientAdapter::new(CountingRemote::default(), LocalFallback::default());
        let mut input = PatientRecordInput::example();
        input.age = -1;

        let err = block_on(adapter.predict_input(&input)).unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));
        assert_eq!(adapter.remote.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_connectivity_failure_tries_remote_once() {
        let adapter = ClientAdapter::new(CountingRemote::default(), LocalFallback::new(Some(demo_bundle())));
        let prediction = assert_ok!(block_on(adapter.predict_input(&PatientRecordInput::example())));
        assert_eq!(prediction.source, PredictionSource::LocalFallback);
        assert_eq!(adapter.remote.calls.load(Ordering::SeqCst), 1);
    }
}
