use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::bundle::ModelBundle;
use crate::error::{PredictorError, PredictorResult};
use crate::models::{
    BatchItemError, BatchItemStatus, BatchPrediction, BatchPredictionResponse, HealthStatus,
    ModelInfo, PatientRecord, PatientRecordInput, PredictionResult, ServiceHealth,
};
use crate::pipeline::argmax;

#[derive(Debug, Clone)]
enum ModelState {
    Loaded(Arc<ModelBundle>),
    Unavailable(Arc<str>),
}

/// Stateless prediction service over a shared, read-only model bundle.
///
/// Cloning is cheap; every clone shares the same bundle.
#[derive(Debug, Clone)]
pub struct PredictionService {
    model: ModelState,
}

impl PredictionService {
    pub fn new(bundle: ModelBundle) -> Self {
        Self::from_shared(Arc::new(bundle))
    }

    pub fn from_shared(bundle: Arc<ModelBundle>) -> Self {
        Self {
            model: ModelState::Loaded(bundle),
        }
    }

    /// A service whose bundle could not be loaded; every prediction fails fast.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            model: ModelState::Unavailable(Arc::from(reason.into())),
        }
    }

    /// Load the bundle at `path`. Never fails: a load error is logged and the
    /// service reports itself unavailable instead.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match ModelBundle::load(path) {
            Ok(bundle) => {
                info!(
                    path = %path.display(),
                    model_type = bundle.model_type(),
                    features = ?bundle.feature_names(),
                    "Model bundle loaded"
                );
                Self::new(bundle)
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to load model bundle");
                Self::unavailable(e.to_string())
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.model, ModelState::Loaded(_))
    }

    pub fn bundle(&self) -> PredictorResult<&ModelBundle> {
        match &self.model {
            ModelState::Loaded(bundle) => Ok(&**bundle),
            ModelState::Unavailable(reason) => Err(PredictorError::unavailable(reason.to_string())),
        }
    }

    pub fn health(&self) -> HealthStatus {
        let model_loaded = self.is_loaded();
        HealthStatus {
            status: if model_loaded {
                ServiceHealth::Healthy
            } else {
                ServiceHealth::Unhealthy
            },
            model_loaded,
        }
    }

    pub fn model_info(&self) -> PredictorResult<ModelInfo> {
        let bundle = self.bundle()?;
        Ok(ModelInfo {
            model_type: bundle.model_type().to_string(),
            expected_features: bundle.feature_names().to_vec(),
            numerical_features: bundle.numerical_columns().to_vec(),
            categorical_features: bundle.categorical_columns().to_vec(),
            has_label_encoder: bundle.label_encoder().is_some(),
            target_classes: bundle.target_classes(),
        })
    }

    /// Validate and score one patient.
    ///
    /// # Errors
    ///
    /// `ServiceUnavailable` when no bundle is loaded (checked before anything
    /// else), `InvalidInput` when validation fails and `Prediction` when the
    /// pipeline cannot score the record.
    pub fn predict(&self, input: &PatientRecordInput) -> PredictorResult<PredictionResult> {
        self.bundle()?;
        let record = input.validate()?;
        self.predict_record(&record)
    }

    /// Score an already validated record.
    pub fn predict_record(&self, record: &PatientRecord) -> PredictorResult<PredictionResult> {
        let bundle = self.bundle()?;
        let row = bundle.build_row(record)?;
        let classifier = bundle.classifier();
        let proba = classifier.predict_proba(&row)?;
        let classes = classifier.classes();

        if proba.len() != classes.len() {
            return Err(PredictorError::prediction(format!(
                "classifier returned {} probabilities for {} classes",
                proba.len(),
                classes.len()
            )));
        }
        if proba.iter().any(|p| !p.is_finite()) {
            return Err(PredictorError::prediction("classifier returned non-finite probabilities"));
        }

        let (best, confidence) =
            argmax(&proba).ok_or_else(|| PredictorError::prediction("classifier returned no probabilities"))?;
        let class_id = classes
            .get(best)
            .copied()
            .ok_or_else(|| PredictorError::prediction("predicted class index out of range"))?;

        let mut probabilities = BTreeMap::new();
        for (id, p) in classes.iter().zip(&proba) {
            let label = bundle
                .label_for(*id)
                .ok_or_else(|| PredictorError::prediction(format!("class id {} has no label", id)))?;
            probabilities.insert(label.to_string(), *p);
        }
        let prediction = bundle
            .label_for(class_id)
            .ok_or_else(|| PredictorError::prediction(format!("class id {} has no label", class_id)))?
            .to_string();

        debug!(prediction = %prediction, class_id, confidence, "Prediction computed");

        Ok(PredictionResult {
            prediction,
            prediction_numeric: class_id,
            probabilities,
            confidence,
        })
    }

    /// Score each record independently; one failing record does not abort the batch.
    ///
    /// # Errors
    ///
    /// Only `ServiceUnavailable` fails the batch as a whole.
    pub fn predict_batch(&self, inputs: &[PatientRecordInput]) -> PredictorResult<BatchPredictionResponse> {
        self.bundle()?;
        let outcomes: Vec<_> = inputs.par_iter().map(|input| self.predict(input)).collect();
        Ok(batch_response(outcomes))
    }

    /// Like [`PredictionService::predict_batch`], decoding each raw JSON
    /// element separately so a malformed element only fails its own slot.
    pub fn predict_batch_json(&self, values: &[serde_json::Value]) -> PredictorResult<BatchPredictionResponse> {
        self.bundle()?;
        let outcomes: Vec<_> = values
            .par_iter()
            .map(|value| PatientRecordInput::from_json(value).and_then(|input| self.predict(&input)))
            .collect();
        Ok(batch_response(outcomes))
    }
}

fn batch_response(outcomes: Vec<PredictorResult<PredictionResult>>) -> BatchPredictionResponse {
    let total_patients = outcomes.len();
    let predictions: Vec<BatchPrediction> = outcomes
        .into_iter()
        .enumerate()
        .map(|(patient_index, outcome)| match outcome {
            Ok(result) => BatchPrediction {
                patient_index,
                status: BatchItemStatus::Ok,
                prediction: Some(result.prediction),
                prediction_numeric: Some(result.prediction_numeric),
                confidence: Some(result.confidence),
                error: None,
            },
            Err(e) => BatchPrediction {
                patient_index,
                status: BatchItemStatus::Error,
                prediction: None,
                prediction_numeric: None,
                confidence: None,
                error: Some(BatchItemError {
                    error_type: e.error_type().to_string(),
                    message: e.to_string(),
                    field_errors: match e {
                        PredictorError::InvalidInput { field_errors, .. } => field_errors,
                        _ => Default::default(),
                    },
                }),
            },
        })
        .collect();
    let failed = predictions
        .iter()
        .filter(|p| p.status == BatchItemStatus::Error)
        .count();

    BatchPredictionResponse {
        total_patients,
        succeeded: total_patients - failed,
        failed,
        predictions,
    }
}
