use std::{path::PathBuf, sync::Arc, time::Instant};

use common::{
    error::AppError,
    storage::{db::SurrealDbClient, types::index_node::IndexNode},
    utils::embedding::EmbeddingProvider,
};
use retrieval_pipeline::{index::IndexAccessor, LlmClient};
use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::{
    extractors, loader,
    plan::{ExtractorFlags, Transformation, TransformationPlan},
    splitter,
};

/// One ingestion run: which directory to read and how to chunk and enrich it.
#[derive(Debug, Clone)]
pub struct IngestionRequest {
    pub input_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub extractors: ExtractorFlags,
}

/// Summary of a completed ingestion run.
#[derive(Debug, Clone)]
pub struct IngestionOutcome {
    pub documents_loaded: usize,
    pub nodes_indexed: usize,
    pub extractors_run: usize,
    pub processing_time_seconds: f64,
}

/// Rebuilds the vector index from a document directory.
///
/// Runs are serialized through an internal mutex: the index is rewritten in
/// place (clear, store, rebuild), so two concurrent runs would interleave
/// their writes. Searches keep reading the old nodes until the run finishes
/// and the accessor is invalidated.
pub struct IngestionPipeline {
    db: Arc<SurrealDbClient>,
    llm: Arc<LlmClient>,
    embeddings: Arc<EmbeddingProvider>,
    accessor: Arc<IndexAccessor>,
    model: String,
    write_lock: Mutex<()>,
}

impl IngestionPipeline {
    pub fn new(
        db: Arc<SurrealDbClient>,
        llm: Arc<LlmClient>,
        embeddings: Arc<EmbeddingProvider>,
        accessor: Arc<IndexAccessor>,
        model: String,
    ) -> Self {
        Self {
            db,
            llm,
            embeddings,
            accessor,
            model,
            write_lock: Mutex::new(()),
        }
    }

    #[instrument(skip(self), fields(input_dir = %request.input_dir.display()))]
    pub async fn run(&self, request: IngestionRequest) -> Result<IngestionOutcome, AppError> {
        let _guard = self.write_lock.lock().await;
        let started = Instant::now();

        let documents = loader::load_documents(&request.input_dir).await?;
        info!(documents = documents.len(), "loaded source documents");

        let plan = TransformationPlan::from_flags(
            request.chunk_size,
            request.chunk_overlap,
            request.extractors,
        );

        let mut nodes: Vec<IndexNode> = Vec::new();
        for stage in plan.stages() {
            match *stage {
                Transformation::Split {
                    chunk_size,
                    chunk_overlap,
                } => {
                    nodes = splitter::split_documents(&documents, chunk_size, chunk_overlap)?;
                    info!(nodes = nodes.len(), "split documents into nodes");
                }
                Transformation::ExtractTitle { sample_nodes } => {
                    extractors::extract_titles(&self.llm, &self.model, &mut nodes, sample_nodes)
                        .await
                        .map_err(as_ingestion_failure)?;
                }
                Transformation::ExtractQuestions { questions } => {
                    extractors::extract_questions(&self.llm, &self.model, &mut nodes, questions)
                        .await
                        .map_err(as_ingestion_failure)?;
                }
                Transformation::ExtractKeywords { max_keywords } => {
                    extractors::extract_keywords(&self.llm, &self.model, &mut nodes, max_keywords)
                        .await
                        .map_err(as_ingestion_failure)?;
                }
                Transformation::ExtractSummary { workers } => {
                    extractors::extract_summaries(&self.llm, &self.model, &mut nodes, workers)
                        .await
                        .map_err(as_ingestion_failure)?;
                }
            }
        }

        let texts: Vec<String> = nodes.iter().map(|node| node.text.clone()).collect();
        let embeddings = self
            .embeddings
            .embed_batch(&texts)
            .await
            .map_err(as_ingestion_failure)?;
        for (node, embedding) in nodes.iter_mut().zip(embeddings) {
            node.embedding = embedding;
        }

        // Fresh index semantics: every run replaces the whole node table.
        self.db
            .clear_table::<IndexNode>()
            .await
            .map_err(as_ingestion_failure)?;
        for node in &nodes {
            self.db
                .store_item(node.clone())
                .await
                .map_err(as_ingestion_failure)?;
        }
        self.db
            .rebuild_index()
            .await
            .map_err(as_ingestion_failure)?;

        self.accessor.invalidate().await;

        let outcome = IngestionOutcome {
            documents_loaded: documents.len(),
            nodes_indexed: nodes.len(),
            extractors_run: plan.extractor_count(),
            processing_time_seconds: started.elapsed().as_secs_f64(),
        };
        info!(
            documents = outcome.documents_loaded,
            nodes = outcome.nodes_indexed,
            seconds = outcome.processing_time_seconds,
            "ingestion run complete"
        );

        Ok(outcome)
    }
}

/// Collapses internal failures into `IngestionFailed`; request-level errors
/// (`SourceNotFound`, `Validation`) keep their own status mapping.
fn as_ingestion_failure<E: Into<AppError>>(err: E) -> AppError {
    match err.into() {
        err @ (AppError::SourceNotFound(_) | AppError::Validation(_)) => err,
        other => AppError::IngestionFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use uuid::Uuid;

    async fn test_pipeline() -> (IngestionPipeline, Arc<IndexAccessor>, Arc<SurrealDbClient>) {
        let db = Arc::new(
            SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
                .await
                .expect("failed to start in-memory surrealdb"),
        );
        db.ensure_initialized(16).await.expect("init");

        let embeddings = Arc::new(EmbeddingProvider::new_hashed(16));
        let accessor = Arc::new(IndexAccessor::new(Arc::clone(&db), Arc::clone(&embeddings)));
        let llm = Arc::new(LlmClient::with_config(
            async_openai::config::OpenAIConfig::new().with_api_key("test-key"),
        ));

        let pipeline = IngestionPipeline::new(
            Arc::clone(&db),
            llm,
            embeddings,
            Arc::clone(&accessor),
            "test-model".into(),
        );
        (pipeline, accessor, db)
    }

    fn request_for(dir: &TempDir) -> IngestionRequest {
        IngestionRequest {
            input_dir: dir.path().to_path_buf(),
            chunk_size: 512,
            chunk_overlap: 128,
            extractors: ExtractorFlags::default(),
        }
    }

    fn write_file(dir: &TempDir, name: &str, content: &str) {
        let mut file = std::fs::File::create(dir.path().join(name)).expect("create file");
        file.write_all(content.as_bytes()).expect("write file");
    }

    #[tokio::test]
    async fn run_indexes_documents_and_unlocks_search() {
        let (pipeline, accessor, _db) = test_pipeline().await;
        let dir = TempDir::new().expect("tempdir");
        write_file(&dir, "baggage.txt", "Checked bags up to 23kg fly free.");
        write_file(&dir, "refunds.txt", "Refunds are available within 24 hours.");

        let outcome = pipeline.run(request_for(&dir)).await.expect("run");

        assert_eq!(outcome.documents_loaded, 2);
        assert!(outcome.nodes_indexed >= 2);
        assert_eq!(outcome.extractors_run, 0);

        let index = accessor.get_index().await.expect("index opens after run");
        assert_eq!(index.node_count, outcome.nodes_indexed as u64);
    }

    #[tokio::test]
    async fn rerun_replaces_the_previous_index() {
        let (pipeline, accessor, db) = test_pipeline().await;
        let dir = TempDir::new().expect("tempdir");
        write_file(&dir, "a.txt", "Pets travel in the cabin.");
        write_file(&dir, "b.txt", "Seat selection costs extra.");
        pipeline.run(request_for(&dir)).await.expect("first run");

        let smaller = TempDir::new().expect("tempdir");
        write_file(&smaller, "only.txt", "Lounge access requires status.");
        let outcome = pipeline.run(request_for(&smaller)).await.expect("rerun");

        let stored: Vec<IndexNode> = db.get_all_stored_items().await.expect("select");
        assert_eq!(stored.len(), outcome.nodes_indexed);
        assert_eq!(stored[0].metadata.file_name.as_deref(), Some("only.txt"));

        let index = accessor.get_index().await.expect("index reopens");
        assert_eq!(index.node_count, outcome.nodes_indexed as u64);
    }

    #[tokio::test]
    async fn missing_directory_passes_through_as_source_not_found() {
        let (pipeline, _accessor, _db) = test_pipeline().await;
        let request = IngestionRequest {
            input_dir: PathBuf::from("/definitely/not/here"),
            chunk_size: 512,
            chunk_overlap: 128,
            extractors: ExtractorFlags::default(),
        };

        let err = pipeline.run(request).await.expect_err("must fail");
        assert!(matches!(err, AppError::SourceNotFound(_)));
    }

    #[tokio::test]
    async fn invalid_chunking_passes_through_as_validation() {
        let (pipeline, _accessor, _db) = test_pipeline().await;
        let dir = TempDir::new().expect("tempdir");
        write_file(&dir, "a.txt", "Some policy text.");

        let request = IngestionRequest {
            input_dir: dir.path().to_path_buf(),
            chunk_size: 100,
            chunk_overlap: 100,
            extractors: ExtractorFlags::default(),
        };

        let err = pipeline.run(request).await.expect_err("must fail");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn internal_errors_collapse_to_ingestion_failed() {
        let err = as_ingestion_failure(AppError::InternalError("disk on fire".into()));
        assert!(matches!(err, AppError::IngestionFailed(_)));

        let err = as_ingestion_failure(AppError::SourceNotFound("gone".into()));
        assert!(matches!(err, AppError::SourceNotFound(_)));
    }
}
