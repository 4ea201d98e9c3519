use std::{fmt, sync::Arc};

use common::{
    error::AppError,
    storage::{db::SurrealDbClient, types::index_node::IndexNode},
    utils::embedding::EmbeddingProvider,
};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A live handle to the persisted vector index: the store connection, the
/// embedding model it was built with, and the node count observed at open.
pub struct SearchIndex {
    pub db: Arc<SurrealDbClient>,
    pub embeddings: Arc<EmbeddingProvider>,
    pub node_count: u64,
}

impl fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchIndex")
            .field("embedding_backend", &self.embeddings.backend_label())
            .field("node_count", &self.node_count)
            .finish_non_exhaustive()
    }
}

/// Lazily constructs and memoizes the [`SearchIndex`] handle.
///
/// Construction and invalidation are guarded by an `RwLock` around an
/// `Option<Arc<_>>`: concurrent first access cannot double-initialize, and
/// invalidation swaps the slot to `None` so in-flight queries holding a
/// stale `Arc` complete safely while new queries pick up the fresh handle.
pub struct IndexAccessor {
    db: Arc<SurrealDbClient>,
    embeddings: Arc<EmbeddingProvider>,
    slot: RwLock<Option<Arc<SearchIndex>>>,
}

impl IndexAccessor {
    pub fn new(db: Arc<SurrealDbClient>, embeddings: Arc<EmbeddingProvider>) -> Self {
        Self {
            db,
            embeddings,
            slot: RwLock::new(None),
        }
    }

    /// Returns the memoized handle, constructing it on first access. Fails
    /// with `StoreUnavailable` when the store cannot be probed or holds no
    /// indexed nodes yet; the caller surfaces that as a request failure.
    pub async fn get_index(&self) -> Result<Arc<SearchIndex>, AppError> {
        if let Some(handle) = self.slot.read().await.as_ref() {
            return Ok(Arc::clone(handle));
        }

        let mut slot = self.slot.write().await;
        // Another task may have won the race while we waited for the lock.
        if let Some(handle) = slot.as_ref() {
            return Ok(Arc::clone(handle));
        }

        self.db
            .query("RETURN true")
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("vector store unreachable: {e}")))?;

        let node_count = IndexNode::count(&self.db)
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("failed to read index: {e}")))?;

        if node_count == 0 {
            return Err(AppError::StoreUnavailable(
                "vector index holds no nodes; ingest documents first".into(),
            ));
        }

        let handle = Arc::new(SearchIndex {
            db: Arc::clone(&self.db),
            embeddings: Arc::clone(&self.embeddings),
            node_count,
        });

        info!(node_count, "opened vector index handle");
        *slot = Some(Arc::clone(&handle));

        Ok(handle)
    }

    /// Clears the memoized handle so the next access reflects newly written
    /// nodes. Called after every successful ingestion run.
    pub async fn invalidate(&self) {
        debug!("invalidating cached index handle");
        *self.slot.write().await = None;
    }
}
