use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Providers whose credentials are configured.
    pub providers: Vec<&'static str>,
}

/// GET /health -- service status and configured providers.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let providers: Vec<&'static str> = state
        .orchestrator
        .registry()
        .available_providers()
        .into_iter()
        .map(|kind| kind.name())
        .collect();

    let status = if providers.is_empty() { "degraded" } else { "ok" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        providers,
    })
}

/// Mount health check routes (root level, not under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
