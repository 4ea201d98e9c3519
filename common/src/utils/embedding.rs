use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::Arc,
};

use anyhow::{anyhow, Result};
use async_openai::{types::CreateEmbeddingRequestArgs, Client};

use crate::utils::config::AppConfig;

/// Maximum characters submitted to the embedding endpoint per input.
const MAX_EMBEDDING_CHARS: usize = 24_000;

#[derive(Clone)]
pub struct EmbeddingProvider {
    inner: EmbeddingInner,
}

#[derive(Clone)]
enum EmbeddingInner {
    OpenAI {
        client: Arc<Client<async_openai::config::OpenAIConfig>>,
        model: String,
        dimensions: u32,
    },
    /// Deterministic local embeddings used by tests; no network involved.
    Hashed { dimension: usize },
}

impl EmbeddingProvider {
    pub fn from_config(
        config: &AppConfig,
        client: Arc<Client<async_openai::config::OpenAIConfig>>,
    ) -> Self {
        Self {
            inner: EmbeddingInner::OpenAI {
                client,
                model: config.embedding_model.clone(),
                dimensions: config.embedding_dimensions,
            },
        }
    }

    pub fn new_hashed(dimension: usize) -> Self {
        Self {
            inner: EmbeddingInner::Hashed { dimension },
        }
    }

    pub fn backend_label(&self) -> &'static str {
        match self.inner {
            EmbeddingInner::Hashed { .. } => "hashed",
            EmbeddingInner::OpenAI { .. } => "openai",
        }
    }

    pub fn dimension(&self) -> usize {
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => *dimension,
            EmbeddingInner::OpenAI { dimensions, .. } => *dimensions as usize,
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => Ok(hashed_embedding(text, *dimension)),
            EmbeddingInner::OpenAI {
                client,
                model,
                dimensions,
            } => {
                let request = CreateEmbeddingRequestArgs::default()
                    .model(model.clone())
                    .input([truncate_for_embedding(text)])
                    .dimensions(*dimensions)
                    .build()?;

                let response = client.embeddings().create(request).await?;

                response
                    .data
                    .into_iter()
                    .next()
                    .map(|d| d.embedding)
                    .ok_or_else(|| anyhow!("embedding endpoint returned no vector for input"))
            }
        }
    }

    /// Embeds a batch of inputs, preserving input order.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => Ok(texts
                .iter()
                .map(|text| hashed_embedding(text, *dimension))
                .collect()),
            EmbeddingInner::OpenAI {
                client,
                model,
                dimensions,
            } => {
                let inputs: Vec<String> =
                    texts.iter().map(|t| truncate_for_embedding(t)).collect();
                let request = CreateEmbeddingRequestArgs::default()
                    .model(model.clone())
                    .input(inputs)
                    .dimensions(*dimensions)
                    .build()?;

                let response = client.embeddings().create(request).await?;

                if response.data.len() != texts.len() {
                    return Err(anyhow!(
                        "embedding endpoint returned {} vectors for {} inputs",
                        response.data.len(),
                        texts.len()
                    ));
                }

                let mut data = response.data;
                data.sort_by_key(|d| d.index);
                Ok(data.into_iter().map(|d| d.embedding).collect())
            }
        }
    }
}

fn truncate_for_embedding(text: &str) -> String {
    if text.chars().count() <= MAX_EMBEDDING_CHARS {
        return text.to_string();
    }
    text.chars().take(MAX_EMBEDDING_CHARS).collect()
}

/// Hashes each token into a bucket and L2-normalizes the resulting counts,
/// giving stable vectors that preserve token overlap between similar texts.
fn hashed_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0f32; dimension.max(1)];

    for token in text.split_whitespace() {
        let mut hasher = DefaultHasher::new();
        token.to_lowercase().hash(&mut hasher);
        let bucket = (hasher.finish() as usize) % vector.len();
        if let Some(slot) = vector.get_mut(bucket) {
            *slot += 1.0;
        }
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }

    vector
}
