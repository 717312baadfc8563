//! Liveness probe.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::models::HealthResponse;

/// `GET /api/health`
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_connected = match &state.pool {
        Some(pool) => sqlx::query("SELECT 1").execute(pool).await.is_ok(),
        None => false,
    };
    Json(HealthResponse {
        status: "ok".into(),
        version: storefront_core::version().to_string(),
        db_connected,
        session_backend: state.sessions.kind().to_string(),
    })
}
