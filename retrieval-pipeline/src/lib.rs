pub mod engine;
pub mod index;
pub mod shaper;
pub mod sub_question;

use std::{sync::Arc, time::Instant};

use common::error::AppError;
use tracing::{info, instrument};

pub use engine::{EngineResponse, QueryEngine};
pub use index::{IndexAccessor, SearchIndex};
pub use shaper::{shape, SearchResponse, SearchResult, FALLBACK_ANSWER};
pub use sub_question::SubQuestionEngine;

pub type LlmClient = async_openai::Client<async_openai::config::OpenAIConfig>;

#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    pub similarity_top_k: usize,
    pub use_sub_questions: bool,
}

/// Routes a query to either the direct query engine or the sub-question
/// decomposition engine, and shapes the raw answer into the response schema.
///
/// Decomposition issues multiple LLM calls and retrieval rounds, so it is
/// strictly opt-in per request.
#[instrument(skip(accessor, llm, model, query), fields(top_k = options.similarity_top_k, sub_questions = options.use_sub_questions))]
pub async fn search(
    accessor: &IndexAccessor,
    llm: Arc<LlmClient>,
    model: &str,
    query: &str,
    options: SearchOptions,
) -> Result<SearchResponse, AppError> {
    let started = Instant::now();

    let index = accessor.get_index().await?;
    let engine = QueryEngine::new(
        index,
        Arc::clone(&llm),
        model.to_string(),
        options.similarity_top_k,
    );

    let raw = if options.use_sub_questions {
        info!("using sub-question decomposition engine");
        SubQuestionEngine::new(engine, llm, model.to_string())
            .query(query)
            .await
    } else {
        info!("using standard query engine");
        engine.query(query).await
    }
    .map_err(as_query_failure)?;

    let response = shape(query, &raw.answer, raw.source_nodes, started.elapsed());
    info!(
        elapsed_secs = response.processing_time_seconds,
        results = response.results.len(),
        "search completed"
    );

    Ok(response)
}

/// Any failure from the underlying retrieval/LLM call surfaces as
/// `QueryFailed` with the original cause attached; taxonomy errors pass
/// through unchanged. Nothing is retried.
fn as_query_failure(err: AppError) -> AppError {
    match err {
        AppError::QueryFailed(_) | AppError::StoreUnavailable(_) | AppError::Validation(_) => err,
        other => AppError::QueryFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_failures_pass_through() {
        let err = as_query_failure(AppError::QueryFailed("llm timeout".into()));
        assert!(matches!(err, AppError::QueryFailed(msg) if msg == "llm timeout"));
    }

    #[test]
    fn infrastructure_errors_become_query_failures() {
        let err = as_query_failure(AppError::InternalError("boom".into()));
        assert!(matches!(err, AppError::QueryFailed(_)));
    }

    #[test]
    fn store_unavailable_keeps_its_kind() {
        let err = as_query_failure(AppError::StoreUnavailable("no index".into()));
        assert!(matches!(err, AppError::StoreUnavailable(_)));
    }
}
