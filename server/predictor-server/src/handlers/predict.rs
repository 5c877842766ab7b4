use axum::{body::Bytes, extract::State, Json};
use logger_redacted::fingerprint;
use predictor_core::{
    BatchPredictionResponse, PatientRecordInput, PredictionResult, PredictionService, PredictorResult,
};
use tracing::{info, warn};

use crate::error::{ApiError, ApiErrorResponse, ApiResult};
use crate::server::PredictorServer;

/// Run CPU-bound scoring off the async workers.
async fn score<T, F>(service: &PredictionService, job: F) -> ApiResult<PredictorResult<T>>
where
    T: Send + 'static,
    F: FnOnce(PredictionService) -> PredictorResult<T> + Send + 'static,
{
    let service = service.clone();
    tokio::task::spawn_blocking(move || job(service))
        .await
        .map_err(|e| ApiError::internal(format!("prediction task failed: {}", e)))
}

/// Parse a request body as JSON. Shape checks are left to the caller so
/// that model availability can be reported first.
fn parse_body(body: &Bytes) -> ApiResult<serde_json::Value> {
    serde_json::from_slice(body).map_err(|e| ApiError::validation(format!("request body is not valid JSON: {}", e)))
}

/// Predict hospitalization for a single patient
#[utoipa::path(
    post,
    path = "/predict",
    tag = "prediction",
    request_body = PatientRecordInput,
    responses(
        (status = 200, description = "Prediction for the patient", body = PredictionResult),
        (status = 400, description = "Invalid patient record or the model could not score it", body = ApiErrorResponse),
        (status = 503, description = "Model not loaded", body = ApiErrorResponse)
    )
)]
pub async fn predict(
    State(server): State<PredictorServer>,
    body: Bytes,
) -> ApiResult<Json<PredictionResult>> {
    server.service().bundle()?;
    let input = PatientRecordInput::from_json(&parse_body(&body)?)?;

    let patient = fingerprint(&input);
    let outcome = score(server.service(), move |service| service.predict(&input)).await?;

    match outcome {
        Ok(result) => {
            info!(
                patient = %patient,
                prediction = %result.prediction,
                confidence = result.confidence,
                "Prediction served"
            );
            Ok(Json(result))
        }
        Err(e) => {
            warn!(patient = %patient, error_type = e.error_type(), "Prediction failed");
            Err(e.into())
        }
    }
}

/// Predict hospitalization for several patients at once
///
/// Each element is decoded and scored on its own; a bad element yields an
/// error entry at its index while the others are still scored.
#[utoipa::path(
    post,
    path = "/predict-batch",
    tag = "prediction",
    request_body = Vec<PatientRecordInput>,
    responses(
        (status = 200, description = "Per-patient outcomes in input order", body = BatchPredictionResponse),
        (status = 400, description = "Body is not a JSON array", body = ApiErrorResponse),
        (status = 503, description = "Model not loaded", body = ApiErrorResponse)
    )
)]
pub async fn predict_batch(
    State(server): State<PredictorServer>,
    body: Bytes,
) -> ApiResult<Json<BatchPredictionResponse>> {
    server.service().bundle()?;
    let values = match parse_body(&body)? {
        serde_json::Value::Array(values) => values,
        _ => return Err(ApiError::validation("request body must be a JSON array of patient records")),
    };

    let batch = fingerprint(&values);
    let response = score(server.service(), move |service| service.predict_batch_json(&values)).await??;

    info!(
        batch = %batch,
        total_patients = response.total_patients,
        failed = response.failed,
        "Batch prediction served"
    );
    Ok(Json(response))
}
