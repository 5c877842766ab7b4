use axum::{extract::State, Json};
use predictor_core::{HealthStatus, ModelInfo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::error::{ApiErrorResponse, ApiResult};
use crate::routes::paths;
use crate::server::PredictorServer;

/// Service landing response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServiceIndex {
    #[schema(example = "COVID Patient Hospitalization Prediction API")]
    pub message: String,
    /// "Model loaded" or "Model not loaded"
    #[schema(example = "Model loaded")]
    pub status: String,
    #[schema(example = "0.1.0")]
    pub version: String,
    /// Endpoint name to path
    pub endpoints: BTreeMap<String, String>,
}

/// Service landing page
#[utoipa::path(
    get,
    path = "/",
    tag = "health",
    responses(
        (status = 200, description = "Service description and endpoint index", body = ServiceIndex)
    )
)]
pub async fn root(State(server): State<PredictorServer>) -> Json<ServiceIndex> {
    let status = if server.service().is_loaded() {
        "Model loaded"
    } else {
        "Model not loaded"
    };
    let endpoints = [
        ("predict", paths::PREDICT),
        ("predict_batch", paths::PREDICT_BATCH),
        ("health", paths::HEALTH),
        ("model_info", paths::MODEL_INFO),
        ("openapi", paths::OPENAPI),
    ]
    .into_iter()
    .map(|(name, path)| (name.to_string(), path.to_string()))
    .collect();

    Json(ServiceIndex {
        message: "COVID Patient Hospitalization Prediction API".to_string(),
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints,
    })
}

/// Health check handler
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Health status; model_loaded reports whether predictions are possible", body = HealthStatus)
    )
)]
pub async fn health_check(State(server): State<PredictorServer>) -> Json<HealthStatus> {
    Json(server.service().health())
}

/// Metadata about the loaded model bundle
#[utoipa::path(
    get,
    path = "/model-info",
    tag = "model",
    responses(
        (status = 200, description = "Model metadata", body = ModelInfo),
        (status = 503, description = "Model not loaded", body = ApiErrorResponse)
    )
)]
pub async fn model_info(State(server): State<PredictorServer>) -> ApiResult<Json<ModelInfo>> {
    Ok(Json(server.service().model_info()?))
}
