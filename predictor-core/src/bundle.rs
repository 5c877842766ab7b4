use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::error::{BundleError, PredictorError, PredictorResult};
use crate::models::{FeatureRow, PatientRecord, FEATURE_COLUMNS};
use crate::pipeline::{Classifier, Pipeline};

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Labels used when the bundle carries no label encoder
pub const DEFAULT_CLASS_LABELS: [&str; 2] = ["Not Hospitalized", "Hospitalized"];

const DEFAULT_MODEL_TYPE: &str = "Random Forest Classifier";

fn default_model_type() -> String {
    DEFAULT_MODEL_TYPE.to_string()
}

/// Mapping between numeric class ids and human-readable labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    pub classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn inverse_transform(&self, class_id: i64) -> Option<&str> {
        usize::try_from(class_id)
            .ok()
            .and_then(|idx| self.classes.get(idx))
            .map(String::as_str)
    }
}

/// On-disk shape of a model bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleArtifact {
    pub format_version: u32,
    #[serde(default = "default_model_type")]
    pub model_type: String,
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub numerical_columns: Vec<String>,
    #[serde(default)]
    pub categorical_columns: Vec<String>,
    #[serde(default)]
    pub label_encoder: Option<LabelEncoder>,
    pub pipeline: Pipeline,
}

/// A loaded, read-only model bundle: fitted classifier plus metadata.
#[derive(Debug, Clone)]
pub struct ModelBundle {
    model_type: String,
    classifier: Arc<dyn Classifier>,
    label_encoder: Option<LabelEncoder>,
    feature_names: Vec<String>,
    numerical_columns: Vec<String>,
    categorical_columns: Vec<String>,
}

impl ModelBundle {
    /// Assemble a bundle around any classifier.
    ///
    /// # Errors
    ///
    /// Fails when a feature name is not a patient record column, or when a
    /// class id cannot be translated into a label.
    pub fn new(
        classifier: Arc<dyn Classifier>,
        label_encoder: Option<LabelEncoder>,
        feature_names: Vec<String>,
        numerical_columns: Vec<String>,
        categorical_columns: Vec<String>,
    ) -> Result<Self, BundleError> {
        let bundle = Self {
            model_type: default_model_type(),
            classifier,
            label_encoder,
            feature_names,
            numerical_columns,
            categorical_columns,
        };
        bundle.check_columns()?;
        bundle.check_labels()?;
        Ok(bundle)
    }

    pub fn with_model_type(mut self, model_type: impl Into<String>) -> Self {
        self.model_type = model_type.into();
        self
    }

    /// Validate a deserialized artifact and turn it into a bundle.
    pub fn from_artifact(artifact: BundleArtifact) -> Result<Self, BundleError> {
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(BundleError::UnsupportedVersion(artifact.format_version));
        }
        artifact.pipeline.validate()?;

        let features: HashSet<&str> = artifact.feature_names.iter().map(String::as_str).collect();
        if let Some(column) = artifact
            .pipeline
            .preprocessor
            .input_columns()
            .find(|c| !features.contains(c))
        {
            return Err(BundleError::Invalid(format!(
                "preprocessor column '{}' is not listed in feature_names",
                column
            )));
        }
        let preprocessor = &artifact.pipeline.preprocessor;
        let numerical: Vec<String> = preprocessor.numerical.iter().map(|n| n.column.clone()).collect();
        let categorical: Vec<String> = preprocessor.categorical.iter().map(|c| c.column.clone()).collect();
        check_listed("numerical_columns", &artifact.numerical_columns, &numerical)?;
        check_listed("categorical_columns", &artifact.categorical_columns, &categorical)?;

        let numerical_columns = if artifact.numerical_columns.is_empty() {
            numerical
        } else {
            artifact.numerical_columns
        };
        let categorical_columns = if artifact.categorical_columns.is_empty() {
            categorical
        } else {
            artifact.categorical_columns
        };

        Ok(Self::new(
            Arc::new(artifact.pipeline),
            artifact.label_encoder,
            artifact.feature_names,
            numerical_columns,
            categorical_columns,
        )?
        .with_model_type(artifact.model_type))
    }

    pub fn from_json_str(json: &str) -> Result<Self, BundleError> {
        let artifact: BundleArtifact = serde_json::from_str(json)?;
        Self::from_artifact(artifact)
    }

    /// Read and validate a bundle artifact from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BundleError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| BundleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn model_type(&self) -> &str {
        &self.model_type
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn label_encoder(&self) -> Option<&LabelEncoder> {
        self.label_encoder.as_ref()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn numerical_columns(&self) -> &[String] {
        &self.numerical_columns
    }

    pub fn categorical_columns(&self) -> &[String] {
        &self.categorical_columns
    }

    /// Label for a class id: the encoder's class when present, otherwise
    /// the fixed binary hospitalization mapping.
    pub fn label_for(&self, class_id: i64) -> Option<&str> {
        match &self.label_encoder {
            Some(encoder) => encoder.inverse_transform(class_id),
            None => usize::try_from(class_id)
                .ok()
                .and_then(|idx| DEFAULT_CLASS_LABELS.get(idx))
                .copied(),
        }
    }

    /// Labels of the classifier's classes, in probability column order.
    pub fn target_classes(&self) -> Vec<String> {
        self.classifier
            .classes()
            .iter()
            .filter_map(|id| self.label_for(*id))
            .map(str::to_string)
            .collect()
    }

    /// Build the single-row model input in the bundle's column order.
    pub fn build_row<'a>(&'a self, record: &'a PatientRecord) -> PredictorResult<FeatureRow<'a>> {
        let cells = self
            .feature_names
            .iter()
            .map(|name| {
                record
                    .feature(name)
                    .map(|value| (name.as_str(), value))
                    .ok_or_else(|| PredictorError::prediction(format!("unknown input column '{}'", name)))
            })
            .collect::<PredictorResult<Vec<_>>>()?;
        Ok(FeatureRow::new(cells))
    }

    fn check_columns(&self) -> Result<(), BundleError> {
        if self.feature_names.is_empty() {
            return Err(BundleError::Invalid("feature_names is empty".to_string()));
        }
        if let Some(name) = self
            .feature_names
            .iter()
            .find(|name| !FEATURE_COLUMNS.contains(&name.as_str()))
        {
            return Err(BundleError::Invalid(format!(
                "feature '{}' is not a patient record column",
                name
            )));
        }
        Ok(())
    }

    fn check_labels(&self) -> Result<(), BundleError> {
        let classes = self.classifier.classes();
        if let Some(encoder) = &self.label_encoder {
            let unique: HashSet<&String> = encoder.classes.iter().collect();
            if unique.len() != encoder.classes.len() {
                return Err(BundleError::Invalid("label encoder has duplicate classes".to_string()));
            }
        } else if classes.len() != DEFAULT_CLASS_LABELS.len() {
            return Err(BundleError::Invalid(format!(
                "a bundle without label encoder must be binary, found {} classes",
                classes.len()
            )));
        }
        if let Some(id) = classes.iter().find(|id| self.label_for(**id).is_none()) {
            return Err(BundleError::Invalid(format!("class id {} has no label", id)));
        }
        let labels: HashSet<&str> = classes.iter().filter_map(|id| self.label_for(*id)).collect();
        if labels.len() != classes.len() {
            return Err(BundleError::Invalid("class ids map to duplicate labels".to_string()));
        }
        Ok(())
    }
}

fn check_listed(list_name: &str, listed: &[String], actual: &[String]) -> Result<(), BundleError> {
    if listed.is_empty() {
        return Ok(());
    }
    let listed_set: HashSet<&String> = listed.iter().collect();
    let actual_set: HashSet<&String> = actual.iter().collect();
    if listed_set != actual_set {
        return Err(BundleError::Invalid(format!(
            "{} does not match the preprocessor columns",
            list_name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn artifact_json() -> serde_json::Value {
        json!({
            "format_version": 1,
            "feature_names": ["Age", "Gender"],
            "numerical_columns": ["Age"],
            "categorical_columns": ["Gender"],
            "label_encoder": {"classes": ["No", "Yes"]},
            "pipeline": {
                "preprocessor": {
                    "numerical": [{"column": "Age", "mean": 40.0, "scale": 20.0}],
                    "categorical": [{"column": "Gender", "categories": ["Female", "Male"]}],
                    "handle_unknown": "error"
                },
                "classifier": {
                    "classes": [0, 1],
                    "n_features": 3,
                    "trees": [{"nodes": [
                        {"kind": "split", "feature": 0, "threshold": 0.0, "left": 1, "right": 2},
                        {"kind": "leaf", "value": [3.0, 1.0]},
                        {"kind": "leaf", "value": [1.0, 3.0]}
                    ]}]
                }
            }
        })
    }

    #[test]
    fn test_artifact_loads() {
        let bundle = ModelBundle::from_json_str(&artifact_json().to_string()).unwrap();
        assert_eq!(bundle.model_type(), "Random Forest Classifier");
        assert_eq!(bundle.target_classes(), vec!["No", "Yes"]);
        assert_eq!(bundle.label_for(1), Some("Yes"));
        assert_eq!(bundle.label_for(2), None);
    }

    #[test]
    fn test_default_labels_without_encoder() {
        let mut value = artifact_json();
        value["label_encoder"] = serde_json::Value::Null;
        let bundle = ModelBundle::from_json_str(&value.to_string()).unwrap();
        assert_eq!(bundle.target_classes(), vec!["Not Hospitalized", "Hospitalized"]);
    }

    #[test]
    fn test_rejects_unsupported_version() {
        let mut value = artifact_json();
        value["format_version"] = json!(7);
        assert!(matches!(
            ModelBundle::from_json_str(&value.to_string()),
            Err(BundleError::UnsupportedVersion(7))
        ));
    }

    #[test]
    fn test_rejects_unknown_feature_and_mismatched_lists() {
        let mut value = artifact_json();
        value["feature_names"] = json!(["Age", "Gender", "Hospital_Admission_Date"]);
        assert!(ModelBundle::from_json_str(&value.to_string()).is_err());

        let mut value = artifact_json();
        value["numerical_columns"] = json!(["BMI"]);
        assert!(ModelBundle::from_json_str(&value.to_string()).is_err());
    }

    #[test]
    fn test_rejects_unlabelled_class() {
        let mut value = artifact_json();
        value["label_encoder"] = json!({"classes": ["No"]});
        assert!(matches!(
            ModelBundle::from_json_str(&value.to_string()),
            Err(BundleError::Invalid(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ModelBundle::load("/nonexistent/bundle.json").unwrap_err();
        assert!(matches!(err, BundleError::Io { .. }));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            ModelBundle::from_json_str("{not json"),
            Err(BundleError::Parse(_))
        ));
    }
}
