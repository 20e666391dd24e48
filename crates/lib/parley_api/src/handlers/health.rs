//! Health check endpoint.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::models::HealthResponse;

/// `GET /api/health` — liveness plus store size.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: parley_core::version().to_string(),
        provider: state.chat.provider_name().to_string(),
        conversations: state.chat.store().live_len(),
    })
}
