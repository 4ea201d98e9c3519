use std::sync::Arc;

use common::{storage::db::SurrealDbClient, utils::config::AppConfig};
use ingestion_pipeline::IngestionPipeline;
use retrieval_pipeline::{IndexAccessor, LlmClient};

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub config: AppConfig,
    pub llm: Arc<LlmClient>,
    pub accessor: Arc<IndexAccessor>,
    pub pipeline: Arc<IngestionPipeline>,
}

impl ApiState {
    pub fn new(
        db: Arc<SurrealDbClient>,
        config: AppConfig,
        llm: Arc<LlmClient>,
        accessor: Arc<IndexAccessor>,
        pipeline: Arc<IngestionPipeline>,
    ) -> Self {
        Self {
            db,
            config,
            llm,
            accessor,
            pipeline,
        }
    }
}
