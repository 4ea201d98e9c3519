use std::sync::Arc;

use async_openai::types::{
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
};
use common::{
    error::AppError,
    storage::types::index_node::{IndexNode, ScoredNode},
};
use tracing::debug;

use crate::{LlmClient, SearchIndex};

/// System prompt for grounded answer synthesis. The model must fall back to
/// the literal sentinel when the context cannot answer the question; the
/// response shaper replaces that sentinel with the user-facing fallback.
const SYNTHESIS_SYSTEM_PROMPT: &str = "You are an assistant answering questions about airline \
policies. Answer using only the provided context excerpts, citing no outside knowledge. If the \
context does not contain the information needed to answer, reply with exactly: Empty Response";

/// Raw output of a query engine: the synthesized answer plus the source
/// nodes it was grounded in, in retrieval order.
#[derive(Debug)]
pub struct EngineResponse {
    pub answer: String,
    pub source_nodes: Vec<ScoredNode>,
}

/// Direct query engine: retrieves the `top_k` nearest nodes by embedding
/// similarity and synthesizes an answer grounded in the retrieved text.
pub struct QueryEngine {
    index: Arc<SearchIndex>,
    llm: Arc<LlmClient>,
    model: String,
    top_k: usize,
}

impl QueryEngine {
    pub fn new(index: Arc<SearchIndex>, llm: Arc<LlmClient>, model: String, top_k: usize) -> Self {
        Self {
            index,
            llm,
            model,
            top_k,
        }
    }

    pub async fn query(&self, query: &str) -> Result<EngineResponse, AppError> {
        let source_nodes = self.retrieve(query).await?;

        if source_nodes.is_empty() {
            debug!("retrieval returned no nodes; skipping synthesis");
            return Ok(EngineResponse {
                answer: String::new(),
                source_nodes,
            });
        }

        let answer = self.synthesize(query, &source_nodes).await?;

        Ok(EngineResponse {
            answer,
            source_nodes,
        })
    }

    /// Embeds the query and runs the nearest-neighbour search, most similar
    /// node first.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredNode>, AppError> {
        let embedding = self
            .index
            .embeddings
            .embed(query)
            .await
            .map_err(AppError::query_failed)?;

        let nodes = IndexNode::find_similar(&self.index.db, embedding, self.top_k).await?;
        debug!(retrieved = nodes.len(), top_k = self.top_k, "retrieval done");

        Ok(nodes)
    }

    async fn synthesize(&self, query: &str, nodes: &[ScoredNode]) -> Result<String, AppError> {
        let user_message = build_context_message(query, nodes);

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestSystemMessage::from(SYNTHESIS_SYSTEM_PROMPT).into(),
                ChatCompletionRequestUserMessage::from(user_message).into(),
            ])
            .build()
            .map_err(AppError::query_failed)?;

        let response = self
            .llm
            .chat()
            .create(request)
            .await
            .map_err(AppError::query_failed)?;

        first_choice_content(response)
    }
}

/// Formats retrieved excerpts plus the user question into a single prompt.
pub(crate) fn build_context_message(query: &str, nodes: &[ScoredNode]) -> String {
    let mut context = String::new();
    for (i, scored) in nodes.iter().enumerate() {
        let file = scored
            .node
            .metadata
            .file_name
            .as_deref()
            .unwrap_or("unknown source");
        context.push_str(&format!(
            "[excerpt {n} from {file}]\n{text}\n\n",
            n = i + 1,
            text = scored.node.text
        ));
    }

    format!(
        "Context excerpts:\n==================\n{context}\nUser question:\n==================\n{query}"
    )
}

/// Pulls the assistant text out of a chat completion response.
pub(crate) fn first_choice_content(
    response: CreateChatCompletionResponse,
) -> Result<String, AppError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(AppError::LLMParsing(
            "No content found in LLM response".into(),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::types::index_node::IndexNode;

    fn scored(text: &str, file: Option<&str>, score: f32) -> ScoredNode {
        let mut node = IndexNode::new(
            text.to_string(),
            "placeholder".into(),
            "placeholder".into(),
        );
        node.metadata.file_name = file.map(str::to_string);
        ScoredNode {
            node,
            score: Some(score),
        }
    }

    #[test]
    fn context_message_includes_excerpts_and_query() {
        let nodes = vec![
            scored("Bags up to 23kg fly free.", Some("baggage.pdf"), 0.9),
            scored("Refunds within 24 hours.", None, 0.5),
        ];

        let message = build_context_message("What is the baggage limit?", &nodes);

        assert!(message.contains("[excerpt 1 from baggage.pdf]"));
        assert!(message.contains("[excerpt 2 from unknown source]"));
        assert!(message.contains("Bags up to 23kg fly free."));
        assert!(message.ends_with("What is the baggage limit?"));
    }

    #[test]
    fn excerpts_keep_retrieval_order() {
        let nodes = vec![
            scored("first", Some("a.pdf"), 0.9),
            scored("second", Some("b.pdf"), 0.8),
        ];
        let message = build_context_message("q", &nodes);
        let first = message.find("first").expect("first excerpt present");
        let second = message.find("second").expect("second excerpt present");
        assert!(first < second);
    }
}
