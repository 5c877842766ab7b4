pub mod health;
pub mod predict;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::routes::paths;

/// Fallback for unknown paths
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Endpoint not found",
            "available_endpoints": paths::ALL,
        })),
    )
}
