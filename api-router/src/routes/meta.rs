use axum::{response::IntoResponse, Json};
use serde_json::json;

/// Static service metadata served at the root path.
pub async fn api_metadata() -> impl IntoResponse {
    Json(json!({
        "name": "airline-policy-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "ingest": "POST /api/v1/ingest",
            "search": "POST /api/v1/search",
            "health": "GET /health",
            "chat": "GET /chat"
        }
    }))
}
