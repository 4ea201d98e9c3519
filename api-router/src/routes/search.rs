use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};
use retrieval_pipeline::SearchOptions;
use serde::Deserialize;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

const MIN_TOP_K: usize = 1;
const MAX_TOP_K: usize = 50;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub similarity_top_k: usize,
    #[serde(default)]
    pub use_sub_questions: bool,
}

fn default_top_k() -> usize {
    10
}

impl SearchParams {
    fn validate(&self) -> Result<(), ApiError> {
        if self.query.trim().is_empty() {
            return Err(ApiError::ValidationError(
                "query must not be empty".to_string(),
            ));
        }
        if !(MIN_TOP_K..=MAX_TOP_K).contains(&self.similarity_top_k) {
            return Err(ApiError::ValidationError(format!(
                "similarity_top_k must be between {MIN_TOP_K} and {MAX_TOP_K}, got {}",
                self.similarity_top_k
            )));
        }
        Ok(())
    }
}

pub async fn search(
    State(state): State<ApiState>,
    Json(params): Json<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    params.validate()?;

    info!(
        top_k = params.similarity_top_k,
        sub_questions = params.use_sub_questions,
        "received search request"
    );

    let response = retrieval_pipeline::search(
        &state.accessor,
        Arc::clone(&state.llm),
        &state.config.model,
        &params.query,
        SearchOptions {
            similarity_top_k: params.similarity_top_k,
            use_sub_questions: params.use_sub_questions,
        },
    )
    .await?;

    Ok(Json(response))
}
