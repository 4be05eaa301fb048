use super::websocket::{AppState, ws_handler};
use crate::session::SessionState;
use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub solver: &'static str,
    pub uptime_seconds: u64,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        solver: state.solver.solver_name(),
        uptime_seconds: state.uptime_seconds(),
    })
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Server version
    pub version: &'static str,
    /// Number of open WebSocket sessions
    pub active_sessions: usize,
    /// Open sessions grouped by state
    pub sessions_by_state: BTreeMap<&'static str, usize>,
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION"),
        active_sessions: state.sessions.active_count().await,
        sessions_by_state: state.sessions.counts_by_state().await,
    })
}

/// Update gauge metrics for sessions (called periodically)
pub async fn update_gauge_metrics(state: &AppState) {
    metrics::gauge!("segment_sessions_active").set(state.sessions.active_count().await as f64);
    let counts = state.sessions.counts_by_state().await;
    for name in SessionState::NAMES {
        let count = counts.get(name).copied().unwrap_or(0);
        metrics::gauge!("segment_sessions", "state" => name).set(count as f64);
    }
    metrics::gauge!("segment_uptime_seconds").set(state.uptime_seconds() as f64);
}

/// WebSocket and JSON routes
///
/// The socket is served on `/` for browser clients that connect to the bare
/// host, and on `/ws`.
pub fn app_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
}
