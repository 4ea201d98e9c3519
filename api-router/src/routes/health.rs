use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;

use crate::api_state::ApiState;

/// Health probe: 200 when the vector store answers, else 503.
pub async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    match state.db.client.query("RETURN true").await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "timestamp": Utc::now()
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "timestamp": Utc::now(),
                "reason": e.to_string()
            })),
        ),
    }
}
