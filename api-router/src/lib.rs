use api_state::ApiState;
use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use routes::{health::health, ingest::ingest, meta::api_metadata, search::search};

pub mod api_state;
pub mod error;
mod routes;

/// Router for API functionality, version 1. Mounted under `/api/v1`.
pub fn api_routes_v1<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    Router::new()
        .route("/ingest", post(ingest))
        .route("/search", post(search))
}

/// Top-level routes served outside the versioned API prefix.
pub fn root_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    Router::new()
        .route("/", get(api_metadata))
        .route("/health", get(health))
}
