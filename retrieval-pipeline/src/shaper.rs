use std::time::Duration;

use chrono::{DateTime, Utc};
use common::storage::types::index_node::ScoredNode;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Fixed fallback substituted for empty or sentinel answers.
pub const FALLBACK_ANSWER: &str = "I couldn't find relevant information to answer your question. \
Please contact customer support for further assistance.";

/// Sentinel some models emit when retrieval gave them nothing to work with.
const EMPTY_RESPONSE_SENTINEL: &str = "empty response";

/// Prefix marking decomposition-internal pseudo sources.
const SUB_QUESTION_PREFIX: &str = "sub question:";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub file_name: String,
    pub summary: String,
    pub score: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub answer: String,
    pub results: Vec<SearchResult>,
    pub processing_time_seconds: f64,
    pub timestamp: DateTime<Utc>,
}

/// Converts a raw answer plus source nodes into the external response
/// schema: guardrail substitution for degenerate answers, filtering of
/// decomposition artifacts, and metadata fallbacks. Retrieval order is
/// preserved; no re-sorting.
pub fn shape(
    query: &str,
    raw_answer: &str,
    raw_nodes: Vec<ScoredNode>,
    elapsed: Duration,
) -> SearchResponse {
    let answer = if is_degenerate(raw_answer) {
        warn!(%query, "empty or sentinel answer; substituting fallback");
        FALLBACK_ANSWER.to_string()
    } else {
        raw_answer.to_string()
    };

    let results = raw_nodes
        .into_iter()
        .filter(|scored| !is_sub_question_artifact(&scored.node.text))
        .map(|scored| SearchResult {
            file_name: scored
                .node
                .metadata
                .file_name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            summary: scored
                .node
                .metadata
                .document_title
                .filter(|title| !title.is_empty())
                .unwrap_or_else(|| "No summary available".to_string()),
            score: scored.score,
        })
        .collect();

    SearchResponse {
        query: query.to_string(),
        answer,
        results,
        processing_time_seconds: elapsed.as_secs_f64(),
        timestamp: Utc::now(),
    }
}

fn is_degenerate(answer: &str) -> bool {
    let trimmed = answer.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(EMPTY_RESPONSE_SENTINEL)
}

fn is_sub_question_artifact(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.len() >= SUB_QUESTION_PREFIX.len()
        && trimmed
            .get(..SUB_QUESTION_PREFIX.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(SUB_QUESTION_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::types::index_node::IndexNode;

    fn node(text: &str, file_name: Option<&str>, title: Option<&str>, score: Option<f32>) -> ScoredNode {
        let mut index_node = IndexNode::new(text.to_string(), String::new(), String::new());
        index_node.metadata.file_name = file_name.map(str::to_string);
        index_node.metadata.document_title = title.map(str::to_string);
        ScoredNode {
            node: index_node,
            score,
        }
    }

    #[test]
    fn degenerate_answers_get_the_fallback() {
        for raw in ["", " ", "Empty Response", "EMPTY RESPONSE", "  empty response  "] {
            let response = shape("q", raw, vec![], Duration::from_millis(5));
            assert_eq!(response.answer, FALLBACK_ANSWER, "raw answer: {raw:?}");
        }
    }

    #[test]
    fn real_answers_pass_through_verbatim() {
        let response = shape("q", "Bags up to 23kg fly free.", vec![], Duration::ZERO);
        assert_eq!(response.answer, "Bags up to 23kg fly free.");
    }

    #[test]
    fn sub_question_artifacts_are_filtered_exhaustively() {
        let nodes = vec![
            node("Sub question: what is the limit?", None, None, None),
            node("  SUB QUESTION: uppercase variant", None, None, None),
            node("sub question: lowercase variant", None, None, None),
            node("Genuine excerpt about baggage.", Some("baggage.pdf"), None, Some(0.8)),
        ];

        let response = shape("q", "answer", nodes, Duration::ZERO);

        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].file_name, "baggage.pdf");
    }

    #[test]
    fn metadata_fallbacks_apply() {
        let nodes = vec![node("excerpt", None, None, None)];
        let response = shape("q", "answer", nodes, Duration::ZERO);

        assert_eq!(response.results[0].file_name, "Unknown");
        assert_eq!(response.results[0].summary, "No summary available");
        assert!(response.results[0].score.is_none());
    }

    #[test]
    fn retrieval_order_is_preserved() {
        let nodes = vec![
            node("a", Some("a.pdf"), Some("A"), Some(0.2)),
            node("b", Some("b.pdf"), Some("B"), Some(0.9)),
        ];
        let response = shape("q", "answer", nodes, Duration::ZERO);

        let files: Vec<_> = response
            .results
            .iter()
            .map(|r| r.file_name.as_str())
            .collect();
        assert_eq!(files, vec!["a.pdf", "b.pdf"], "no global re-sort by score");
    }

    #[test]
    fn interior_sub_question_mention_is_not_filtered() {
        let nodes = vec![node(
            "The policy covers the sub question: none of this matters.",
            Some("policy.pdf"),
            None,
            Some(0.5),
        )];
        let response = shape("q", "answer", nodes, Duration::ZERO);
        assert_eq!(response.results.len(), 1);
    }
}
