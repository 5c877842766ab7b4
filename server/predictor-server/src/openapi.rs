use axum::Json;
use utoipa::OpenApi;

/// Main OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health endpoints
        crate::handlers::health::root,
        crate::handlers::health::health_check,
        crate::handlers::health::model_info,

        // Prediction endpoints
        crate::handlers::predict::predict,
        crate::handlers::predict::predict_batch,
    ),
    components(
        schemas(
            crate::handlers::health::ServiceIndex,
            crate::error::ApiErrorResponse,
            predictor_core::PatientRecordInput,
            predictor_core::FlagInput,
            predictor_core::PredictionResult,
            predictor_core::HealthStatus,
            predictor_core::ServiceHealth,
            predictor_core::ModelInfo,
            predictor_core::BatchPredictionResponse,
            predictor_core::BatchPrediction,
            predictor_core::BatchItemStatus,
            predictor_core::BatchItemError,
        )
    ),
    tags(
        (name = "health", description = "Service health and status endpoints"),
        (name = "model", description = "Loaded model metadata"),
        (name = "prediction", description = "Hospitalization prediction for COVID patients"),
    ),
    info(
        title = "COVID Patient Hospitalization Predictor",
        version = "1.0.0",
        description = "API to predict if a COVID patient will be hospitalized",
    ),
)]
pub struct ApiDoc;

/// Serve the OpenAPI document
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
