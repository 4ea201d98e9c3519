use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{deserialize_flexible_id, StoredObject};
use crate::{error::AppError, storage::db::SurrealDbClient};

/// Metadata accumulated on a node by the ingestion transformation stages.
/// Stages run in a fixed order and later stages may read what earlier ones
/// wrote (summary extraction reads `document_title`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions_answered: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_summary: Option<String>,
}

/// A chunk of a document after splitting: the atomic unit written to and
/// retrieved from the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexNode {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub text: String,
    #[serde(default)]
    pub metadata: NodeMetadata,
    #[serde(default)]
    pub embedding: Vec<f32>,
}

impl StoredObject for IndexNode {
    fn table_name() -> &'static str {
        "index_node"
    }

    fn get_id(&self) -> &str {
        &self.id
    }
}

/// A retrieved node together with its similarity score. The score is derived
/// from the store's cosine distance (`1 - distance`, higher is more
/// relevant); pseudo nodes produced by query decomposition carry no score.
#[derive(Debug, Clone)]
pub struct ScoredNode {
    pub node: IndexNode,
    pub score: Option<f32>,
}

// Deserialized field by field: SurrealDB's value enums do not survive a
// serde flatten round-trip.
#[derive(Debug, Deserialize)]
struct KnnRow {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    id: String,
    created_at: DateTime<Utc>,
    text: String,
    #[serde(default)]
    metadata: NodeMetadata,
    #[serde(default)]
    embedding: Vec<f32>,
    distance: Option<f32>,
}

impl KnnRow {
    fn into_scored(self) -> ScoredNode {
        ScoredNode {
            score: self.distance.map(|d| 1.0 - d),
            node: IndexNode {
                id: self.id,
                created_at: self.created_at,
                text: self.text,
                metadata: self.metadata,
                embedding: self.embedding,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: u64,
}

impl IndexNode {
    pub fn new(text: String, file_name: String, file_path: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            text,
            metadata: NodeMetadata {
                file_name: Some(file_name),
                file_path: Some(file_path),
                ..NodeMetadata::default()
            },
            embedding: Vec::new(),
        }
    }

    /// Retrieves the `take` nearest nodes by embedding similarity, ordered
    /// most similar first.
    pub async fn find_similar(
        db: &SurrealDbClient,
        embedding: Vec<f32>,
        take: usize,
    ) -> Result<Vec<ScoredNode>, AppError> {
        // The search width must be at least as large as the requested
        // neighbour count or the store caps the result set below `take`.
        let ef = take.max(40);
        let closest_query = format!(
            "SELECT *, vector::distance::knn() AS distance FROM {} \
             WHERE embedding <|{take},{ef}|> $embedding ORDER BY distance",
            Self::table_name(),
        );

        let rows: Vec<KnnRow> = db
            .query(closest_query)
            .bind(("embedding", embedding))
            .await?
            .take(0)?;

        Ok(rows.into_iter().map(KnnRow::into_scored).collect())
    }

    pub async fn count(db: &SurrealDbClient) -> Result<u64, AppError> {
        let rows: Vec<CountRow> = db
            .query(format!(
                "SELECT count() AS count FROM {} GROUP ALL",
                Self::table_name()
            ))
            .await?
            .take(0)?;

        Ok(rows.first().map_or(0, |row| row.count))
    }
}
