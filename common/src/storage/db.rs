use std::{ops::Deref, path::Path};

use surrealdb::{
    engine::any::{connect, Any},
    Error, Surreal,
};

use super::types::StoredObject;
use crate::error::AppError;

/// Name of the HNSW index over node embeddings.
pub const NODE_EMBEDDING_INDEX: &str = "idx_embedding_index_node";

#[derive(Clone)]
pub struct SurrealDbClient {
    pub client: Surreal<Any>,
}

impl SurrealDbClient {
    /// Opens the file-backed vector store at the configured persistence
    /// location, creating it when absent.
    pub async fn open(store_path: &Path) -> Result<Self, Error> {
        let address = format!("surrealkv://{}", store_path.display());
        let db = connect(address).await?;

        db.use_ns("rag").use_db("index").await?;

        Ok(SurrealDbClient { client: db })
    }

    /// Defines the node table and its HNSW embedding index. Idempotent, the
    /// dimension must match the configured embedding model.
    pub async fn ensure_initialized(&self, dimension: usize) -> Result<(), AppError> {
        self.client
            .query("DEFINE TABLE IF NOT EXISTS index_node SCHEMALESS")
            .await?;
        self.client
            .query(format!(
                "DEFINE INDEX IF NOT EXISTS {NODE_EMBEDDING_INDEX} ON TABLE index_node \
                 FIELDS embedding HNSW DIMENSION {dimension} DIST COSINE"
            ))
            .await?;

        Ok(())
    }

    pub async fn rebuild_index(&self) -> Result<(), Error> {
        self.client
            .query(format!(
                "REBUILD INDEX IF EXISTS {NODE_EMBEDDING_INDEX} ON index_node"
            ))
            .await?;
        Ok(())
    }

    /// Operation to store a object in SurrealDB, requires the struct to implement StoredObject
    pub async fn store_item<T>(&self, item: T) -> Result<Option<T>, Error>
    where
        T: StoredObject + Send + Sync + 'static,
    {
        self.client
            .create((T::table_name(), item.get_id()))
            .content(item)
            .await
    }

    pub async fn get_all_stored_items<T>(&self) -> Result<Vec<T>, Error>
    where
        T: StoredObject,
    {
        self.client.select(T::table_name()).await
    }

    /// Removes every row of the table; used when an ingestion run rewrites
    /// the index.
    pub async fn clear_table<T>(&self) -> Result<(), Error>
    where
        T: StoredObject,
    {
        let _: Vec<T> = self.client.delete(T::table_name()).await?;
        Ok(())
    }
}

impl Deref for SurrealDbClient {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl SurrealDbClient {
    /// Create an in-memory SurrealDB client for testing.
    pub async fn memory(namespace: &str, database: &str) -> Result<Self, Error> {
        let db = connect("mem://").await?;

        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::index_node::IndexNode;
    use uuid::Uuid;

    async fn memory_db() -> SurrealDbClient {
        SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("failed to start in-memory surrealdb")
    }

    #[tokio::test]
    async fn test_initialization_is_idempotent() {
        let db = memory_db().await;
        db.ensure_initialized(3).await.expect("first init");
        db.ensure_initialized(3).await.expect("second init");
        db.rebuild_index().await.expect("rebuild");
    }

    #[tokio::test]
    async fn test_store_and_clear_round_trip() {
        let db = memory_db().await;
        db.ensure_initialized(3).await.expect("init");

        let mut node = IndexNode::new(
            "Checked baggage is limited to 23kg.".into(),
            "baggage.pdf".into(),
            "/policies/baggage.pdf".into(),
        );
        node.embedding = vec![0.1, 0.2, 0.3];
        db.store_item(node).await.expect("store");

        let stored: Vec<IndexNode> = db.get_all_stored_items().await.expect("select");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].metadata.file_name.as_deref(), Some("baggage.pdf"));

        db.clear_table::<IndexNode>().await.expect("clear");
        let remaining: Vec<IndexNode> = db.get_all_stored_items().await.expect("select");
        assert!(remaining.is_empty());
    }
}
