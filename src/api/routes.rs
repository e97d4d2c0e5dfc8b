//! HTTP API route definitions.

use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    config, health, metrics, opportunities, pause, positions, ready, resume, status, AppState,
};

/// Create the API router.
///
/// Browsers may read reporting endpoints cross-origin; control endpoints
/// stay same-origin.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Reporting
        .route("/api/v1/status", get(status))
        .route("/api/v1/positions", get(positions))
        .route("/api/v1/opportunities", get(opportunities))
        .route("/api/v1/config", get(config))
        // Control
        .route("/api/v1/pause", post(pause))
        .route("/api/v1/resume", post(resume))
        .route("/metrics", get(metrics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
