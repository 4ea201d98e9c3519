use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Source not found: {0}")]
    SourceNotFound(String),
    #[error("Ingestion failed: {0}")]
    IngestionFailed(String),
    #[error("Vector store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("LLM parsing error: {0}")]
    LLMParsing(String),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Wraps any retrieval/LLM failure as a `QueryFailed` with the original
    /// cause attached.
    pub fn query_failed(err: impl std::fmt::Display) -> Self {
        Self::QueryFailed(err.to_string())
    }
}
