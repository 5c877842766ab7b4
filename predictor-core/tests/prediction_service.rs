use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use predictor_core::{
    BatchItemStatus, Classifier, FeatureRow, LabelEncoder, ModelBundle, PatientRecordInput,
    PredictionService, PredictorError, PredictorResult, ServiceHealth, FEATURE_COLUMNS,
};
use serde_json::json;

fn demo_bundle_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../models/covid_forest.json")
}

fn demo_service() -> PredictionService {
    let service = PredictionService::load(demo_bundle_path());
    assert!(service.is_loaded(), "demo bundle failed to load");
    service
}

/// Classifier returning fixed probabilities and counting invocations
#[derive(Debug)]
struct FixedClassifier {
    classes: Vec<i64>,
    proba: Vec<f64>,
    calls: Arc<AtomicUsize>,
}

impl Classifier for FixedClassifier {
    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn predict_proba(&self, row: &FeatureRow<'_>) -> PredictorResult<Vec<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(row.len(), FEATURE_COLUMNS.len());
        Ok(self.proba.clone())
    }
}

fn mock_service(proba: Vec<f64>, encoder: Option<LabelEncoder>) -> (PredictionService, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let classifier = FixedClassifier {
        classes: vec![0, 1],
        proba,
        calls: Arc::clone(&calls),
    };
    let columns = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    let bundle = ModelBundle::new(
        Arc::new(classifier),
        encoder,
        columns(&FEATURE_COLUMNS),
        columns(&["Age", "Doses_Received", "BMI"]),
        FEATURE_COLUMNS
            .iter()
            .filter(|c| !matches!(**c, "Age" | "Doses_Received" | "BMI"))
            .map(|c| c.to_string())
            .collect(),
    )
    .unwrap();
    (PredictionService::new(bundle), calls)
}

#[test]
fn test_demo_bundle_metadata() {
    let service = demo_service();
    let health = service.health();
    assert_eq!(health.status, ServiceHealth::Healthy);
    assert!(health.model_loaded);

    let info = service.model_info().unwrap();
    assert_eq!(info.model_type, "Random Forest Classifier");
    assert_eq!(info.expected_features.len(), 16);
    assert_eq!(info.numerical_features, vec!["Age", "Doses_Received", "BMI"]);
    assert_eq!(info.categorical_features.len(), 13);
    assert!(info.has_label_encoder);
    assert_eq!(info.target_classes, vec!["Not Hospitalized", "Hospitalized"]);
}

#[test]
fn test_demo_prediction_is_a_distribution() {
    let service = demo_service();
    let result = service.predict(&PatientRecordInput::example()).unwrap();

    let total: f64 = result.probabilities.values().sum();
    assert!((total - 1.0).abs() < 1e-6);
    let max = result.probabilities.values().copied().fold(f64::MIN, f64::max);
    assert!((result.confidence - max).abs() < 1e-12);
    assert!(result.probabilities.contains_key(&result.prediction));
    assert_eq!(result.prediction, "Not Hospitalized");
    assert_eq!(result.prediction_numeric, 0);
}

#[test]
fn test_demo_critical_patient_is_hospitalized() {
    let service = demo_service();
    let mut input = PatientRecordInput::example();
    input.age = 78;
    input.severity = "Critical".to_string();
    input.symptoms = "Severe".to_string();
    input.icu_admission = true.into();
    input.ventilator_support = true.into();
    input.recovered = false.into();

    let result = service.predict(&input).unwrap();
    assert_eq!(result.prediction, "Hospitalized");
    assert_eq!(result.prediction_numeric, 1);
    assert!(result.confidence > 0.5);
}

#[test]
fn test_encoder_label_for_class_one() {
    let (service, calls) = mock_service(
        vec![0.2, 0.8],
        Some(LabelEncoder::new(["Not Hospitalized", "Hospitalized"])),
    );
    let result = service.predict(&PatientRecordInput::example()).unwrap();
    assert_eq!(result.prediction, "Hospitalized");
    assert_eq!(result.prediction_numeric, 1);
    assert!((result.confidence - 0.8).abs() < 1e-12);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_fixed_mapping_without_encoder() {
    let (service, _) = mock_service(vec![0.7, 0.3], None);
    let result = service.predict(&PatientRecordInput::example()).unwrap();
    assert_eq!(result.prediction, "Not Hospitalized");
    assert_eq!(result.probabilities["Hospitalized"], 0.3);
    assert!(!service.model_info().unwrap().has_label_encoder);
}

#[test]
fn test_tie_resolves_to_first_class() {
    let (service, _) = mock_service(vec![0.5, 0.5], None);
    let result = service.predict(&PatientRecordInput::example()).unwrap();
    assert_eq!(result.prediction_numeric, 0);
}

#[test]
fn test_invalid_input_never_reaches_model() {
    let (service, calls) = mock_service(vec![0.4, 0.6], None);

    let mut input = PatientRecordInput::example();
    input.age = 150;
    input.doses_received = -1;
    match service.predict(&input).unwrap_err() {
        PredictorError::InvalidInput { field_errors, .. } => {
            assert!(field_errors.contains_key("Age"));
            assert!(field_errors.contains_key("Doses_Received"));
        }
        other => panic!("expected invalid input, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unavailable_service_fails_fast() {
    let service = PredictionService::load("/nonexistent/random_forest_pipeline.json");
    assert!(!service.is_loaded());

    let health = service.health();
    assert_eq!(health.status, ServiceHealth::Unhealthy);
    assert!(!health.model_loaded);

    assert!(matches!(
        service.model_info(),
        Err(PredictorError::ServiceUnavailable { .. })
    ));

    // Availability is checked before validation
    let mut input = PatientRecordInput::example();
    input.age = -5;
    assert!(matches!(
        service.predict(&input),
        Err(PredictorError::ServiceUnavailable { .. })
    ));
    assert!(matches!(
        service.predict_batch(&[PatientRecordInput::example()]),
        Err(PredictorError::ServiceUnavailable { .. })
    ));
}

#[test]
fn test_unknown_category_is_a_prediction_error() {
    let mut artifact: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(demo_bundle_path()).unwrap()).unwrap();
    artifact["pipeline"]["preprocessor"]["handle_unknown"] = json!("error");
    let bundle = ModelBundle::from_json_str(&artifact.to_string()).unwrap();
    let service = PredictionService::new(bundle);

    let mut input = PatientRecordInput::example();
    input.region = "Hovedstaden".to_string();
    input.preexisting_condition = "Unknown Condition".to_string();
    match service.predict(&input).unwrap_err() {
        PredictorError::Prediction(message) => {
            assert!(message.contains("Preexisting_Condition"), "{}", message);
            assert!(message.contains("Unknown Condition"), "{}", message);
        }
        other => panic!("expected prediction error, got {:?}", other),
    }
}

#[test]
fn test_batch_keeps_order_and_isolates_failures() {
    let service = demo_service();
    let mut bad = PatientRecordInput::example();
    bad.bmi = -3.0;
    let inputs = vec![
        PatientRecordInput::example(),
        bad,
        PatientRecordInput::example(),
    ];

    let response = service.predict_batch(&inputs).unwrap();
    assert_eq!(response.total_patients, 3);
    assert_eq!(response.succeeded, 2);
    assert_eq!(response.failed, 1);

    let indices: Vec<usize> = response.predictions.iter().map(|p| p.patient_index).collect();
    assert_eq!(indices, vec![0, 1, 2]);

    let failed = &response.predictions[1];
    assert_eq!(failed.status, BatchItemStatus::Error);
    let error = failed.error.as_ref().unwrap();
    assert_eq!(error.error_type, "invalid_input");
    assert!(error.field_errors.contains_key("BMI"));

    let single = service.predict(&inputs[0]).unwrap();
    assert_eq!(response.predictions[0].prediction.as_deref(), Some(single.prediction.as_str()));
    assert_eq!(response.predictions[2].confidence, Some(single.confidence));
}

#[test]
fn test_empty_batch() {
    let response = demo_service().predict_batch(&[]).unwrap();
    assert_eq!(response.total_patients, 0);
    assert!(response.predictions.is_empty());
}

#[test]
fn test_json_batch_decodes_each_element() {
    let service = demo_service();
    let good = serde_json::to_value(PatientRecordInput::example()).unwrap();
    let values = vec![good.clone(), json!({"Age": "forty"}), good];

    let response = service.predict_batch_json(&values).unwrap();
    assert_eq!(response.succeeded, 2);
    assert_eq!(response.predictions[1].status, BatchItemStatus::Error);
    assert_eq!(response.predictions[2].status, BatchItemStatus::Ok);
}

#[test]
fn test_bundle_loaded_from_disk_matches_in_memory() {
    let raw = std::fs::read_to_string(demo_bundle_path()).unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(raw.as_bytes()).unwrap();

    let from_disk = PredictionService::load(file.path());
    let in_memory = PredictionService::new(ModelBundle::from_json_str(&raw).unwrap());
    let input = PatientRecordInput::example();
    assert_eq!(
        from_disk.predict(&input).unwrap(),
        in_memory.predict(&input).unwrap()
    );
}

#[test]
fn test_corrupt_bundle_reports_unavailable() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"{\"format_version\": 1").unwrap();
    let service = PredictionService::load(file.path());
    assert!(!service.is_loaded());
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_demo_outputs_are_distributions(
            age in 0i64..=120,
            doses in 0i64..6,
            bmi in 12.0f64..55.0,
            severity in prop::sample::select(vec!["Low", "Moderate", "High", "Critical"]),
            icu in any::<bool>(),
        ) {
            let service = demo_service();
            let mut input = PatientRecordInput::example();
            input.age = age;
            input.doses_received = doses;
            input.bmi = bmi;
            input.severity = severity.to_string();
            input.icu_admission = predictor_core::FlagInput::Bool(icu);

            let result = service.predict(&input).unwrap();
            let total: f64 = result.probabilities.values().sum();
            prop_assert!((total - 1.0).abs() < 1e-6);

            let max = result.probabilities.values().cloned().fold(f64::MIN, f64::max);
            prop_assert_eq!(result.confidence, max);
            prop_assert_eq!(result.probabilities.get(&result.prediction).copied(), Some(max));
        }
    }
}
