//! Liveness and readiness probes.

use axum::{extract::State, http::StatusCode};

use crate::state::AppState;

/// GET /health - liveness. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// GET /health/ready - readiness.
///
/// Verifies database connectivity before returning OK; 503 until the pool
/// answers. Reports ready when the state carries no pool (in-memory mode).
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    let Some(pool) = state.pool() else {
        return StatusCode::OK;
    };

    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
