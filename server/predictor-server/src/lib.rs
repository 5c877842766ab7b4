//! COVID hospitalization predictor HTTP server
//!
//! Exposes the prediction service over HTTP: health and model metadata,
//! single and batch prediction, and the OpenAPI document.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod server;

// Re-export commonly used types
pub use error::*;
pub use server::{PredictorServer, ServerConfig};

use axum::{middleware::from_fn, Router};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Create the main application router with all routes and middleware
pub fn create_app(server: PredictorServer) -> Router {
    let timeout = Duration::from_secs(server.config().request_timeout_secs);

    routes::create_routes()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::create_cors_layer())
                .layer(from_fn(middleware::request_timing_middleware))
                .layer(TimeoutLayer::new(timeout)),
        )
        .with_state(server)
}
