//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (CORS, compression, tracing),
//! and creates the axum router ready for serving.

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/sos", get(handlers::list_services))
        .route("/sos/{service_id}", post(handlers::sos_request))
        .route("/sos/{service_id}/restart", post(handlers::restart_service))
        .route("/sos/{service_id}/observations", delete(handlers::delete_provider))
        .route("/sos/{service_id}/sensors", get(handlers::list_sensors))
        .route("/sos/{service_id}/sensors/{sensor_id}", delete(handlers::delete_sensor))
        .route("/sos/{service_id}/sensors/{sensor_id}/csv", get(handlers::sensor_csv))
        // InsertObservation batches can be large
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
