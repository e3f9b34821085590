//! Health Check Handler

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::startup::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub active_source: String,
    pub store_ok: bool,
}

/// Health check: process liveness plus a ping of the active store.
/// Returns 503 when the active store is unreachable.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let active_source = state.registry.active_name();
    let store_ok = match state.registry.get_active() {
        Ok(pool) => sqlx::query("SELECT 1").execute(&pool).await.is_ok(),
        Err(_) => false,
    };

    let response = HealthResponse {
        status: if store_ok { "healthy" } else { "unhealthy" },
        version: env!("CARGO_PKG_VERSION"),
        active_source,
        store_ok,
    };

    let status_code = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response))
}
