use axum::{
    routing::{get, post, MethodRouter},
    Router,
};

use crate::{
    handlers::{self, health, predict},
    openapi,
    server::PredictorServer,
};

pub mod paths {
    pub const ROOT: &str = "/";
    pub const HEALTH: &str = "/health";
    pub const MODEL_INFO: &str = "/model-info";
    pub const PREDICT: &str = "/predict";
    pub const PREDICT_BATCH: &str = "/predict-batch";
    pub const OPENAPI: &str = "/api-docs/openapi.json";

    pub const ALL: [&str; 6] = [ROOT, HEALTH, MODEL_INFO, PREDICT, PREDICT_BATCH, OPENAPI];
}

/// Register `path` both bare and with a trailing slash.
fn route_both(
    router: Router<PredictorServer>,
    path: &str,
    method_router: MethodRouter<PredictorServer>,
) -> Router<PredictorServer> {
    router
        .route(path, method_router.clone())
        .route(&format!("{}/", path), method_router)
}

/// Create health check routes
pub fn health_routes() -> Router<PredictorServer> {
    let router = Router::new().route(paths::ROOT, get(health::root));
    let router = route_both(router, paths::HEALTH, get(health::health_check));
    route_both(router, paths::MODEL_INFO, get(health::model_info))
}

/// Create prediction routes
pub fn prediction_routes() -> Router<PredictorServer> {
    let router = route_both(Router::new(), paths::PREDICT, post(predict::predict));
    route_both(router, paths::PREDICT_BATCH, post(predict::predict_batch))
}

/// Create all application routes
pub fn create_routes() -> Router<PredictorServer> {
    Router::new()
        .merge(health_routes())
        .merge(prediction_routes())
        .route(paths::OPENAPI, get(openapi::openapi_json))
        .fallback(handlers::not_found)
}
