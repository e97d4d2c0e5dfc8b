//! HTTP API handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

use crate::config::Config;
use crate::edge::Opportunity;
use crate::engine::{Engine, EngineStatus, PositionsView};

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Whether the engine has started ticking.
    pub ready: Arc<AtomicBool>,
    /// Trading engine.
    pub engine: Engine,
    /// Active configuration.
    pub config: Arc<Config>,
    /// Prometheus renderer, when a recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(engine: Engine, config: Arc<Config>) -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
            engine,
            config,
            prometheus: None,
        }
    }

    /// Attach a Prometheus handle for `/metrics`.
    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    /// Set ready state.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Liveness payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "ok" while the process serves requests.
    pub status: &'static str,
    /// Crate version.
    pub version: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether service is ready.
    pub ready: bool,
    /// Whether admissions are paused.
    pub paused: bool,
}

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service status.
    pub status: &'static str,
    /// Engine details.
    #[serde(flatten)]
    pub engine: EngineStatus,
}

/// Pause/resume response.
#[derive(Debug, Serialize)]
pub struct PauseResponse {
    /// Whether admissions are paused after the call.
    pub paused: bool,
}

/// Liveness check. Always 200, independent of engine state.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness check handler - returns 200 if ready, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();
    let response = ReadyResponse {
        ready: is_ready,
        paused: state.engine.is_paused().await,
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Status handler - returns engine, risk and performance figures.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.engine.status().await;
    let status = match (state.is_ready(), engine.risk.paused) {
        (false, _) => "starting",
        (true, true) => "paused",
        (true, false) => "running",
    };
    Json(StatusResponse { status, engine })
}

/// Open and closed positions.
pub async fn positions(State(state): State<AppState>) -> Json<PositionsView> {
    Json(state.engine.positions().await)
}

/// Ranked opportunities from the latest tick.
pub async fn opportunities(State(state): State<AppState>) -> Json<Vec<Opportunity>> {
    Json(state.engine.opportunities().await)
}

/// Active configuration.
pub async fn config(State(state): State<AppState>) -> Json<Config> {
    Json(state.config.as_ref().clone())
}

/// Stop new admissions. Open positions keep being managed.
pub async fn pause(State(state): State<AppState>) -> Json<PauseResponse> {
    state.engine.pause().await;
    Json(PauseResponse { paused: true })
}

/// Resume admissions.
pub async fn resume(State(state): State<AppState>) -> Json<PauseResponse> {
    state.engine.resume().await;
    Json(PauseResponse { paused: false })
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.prometheus {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed".to_string(),
        ),
    }
}
