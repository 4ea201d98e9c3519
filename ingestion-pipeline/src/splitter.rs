use std::sync::OnceLock;

use common::{
    error::AppError,
    storage::types::{document::Document, index_node::IndexNode},
};
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::warn;

/// Rough character budget per token for the character-sized fallback.
const CHARS_PER_TOKEN: usize = 4;

/// Splits every loaded document into nodes. The splitter is sentence-aware
/// and sized in tokens (`chunk_size` per chunk, `chunk_overlap` shared
/// between consecutive chunks); each node carries a back-reference to its
/// source file in its metadata.
pub fn split_documents(
    documents: &[Document],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<IndexNode>, AppError> {
    let mut nodes = Vec::new();

    for document in documents {
        for chunk in chunk_text(&document.text, chunk_size, chunk_overlap)? {
            nodes.push(IndexNode::new(
                chunk,
                document.file_name.clone(),
                document.file_path.clone(),
            ));
        }
    }

    Ok(nodes)
}

pub fn chunk_text(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<String>, AppError> {
    if chunk_size == 0 {
        return Err(AppError::Validation("chunk_size must be positive".into()));
    }
    if chunk_overlap >= chunk_size {
        return Err(AppError::Validation(format!(
            "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
        )));
    }

    let chunks: Vec<String> = match get_tokenizer() {
        Ok(tokenizer) => {
            let chunk_config = ChunkConfig::new(chunk_size)
                .with_overlap(chunk_overlap)
                .map_err(|e| AppError::Validation(format!("invalid chunk overlap: {e}")))?
                .with_sizer(tokenizer);
            TextSplitter::new(chunk_config)
                .chunks(text)
                .map(str::to_owned)
                .collect()
        }
        Err(err) => {
            // Tokenizer download can fail on air-gapped hosts; character
            // sizing keeps ingestion functional with approximate budgets.
            warn!(error = %err, "tokenizer unavailable; falling back to character-sized chunks");
            let chunk_config = ChunkConfig::new(chunk_size.saturating_mul(CHARS_PER_TOKEN))
                .with_overlap(chunk_overlap.saturating_mul(CHARS_PER_TOKEN))
                .map_err(|e| AppError::Validation(format!("invalid chunk overlap: {e}")))?;
            TextSplitter::new(chunk_config)
                .chunks(text)
                .map(str::to_owned)
                .collect()
        }
    };

    Ok(chunks)
}

fn get_tokenizer() -> Result<&'static tokenizers::Tokenizer, String> {
    static TOKENIZER: OnceLock<Result<tokenizers::Tokenizer, String>> = OnceLock::new();

    match TOKENIZER.get_or_init(|| {
        tokenizers::Tokenizer::from_pretrained("bert-base-cased", None)
            .map_err(|e| format!("failed to initialize tokenizer: {e}"))
    }) {
        Ok(tokenizer) => Ok(tokenizer),
        Err(err) => Err(err.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_must_stay_below_chunk_size() {
        let err = chunk_text("some text", 100, 100).expect_err("must fail");
        assert!(matches!(err, AppError::Validation(_)));

        let err = chunk_text("some text", 100, 150).expect_err("must fail");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let err = chunk_text("some text", 0, 0).expect_err("must fail");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn split_documents_tags_nodes_with_their_source() {
        let documents = vec![Document::new(
            "baggage.txt".into(),
            "/policies/baggage.txt".into(),
            "Checked bags up to 23kg fly free. Extra bags cost 50 euro each.".into(),
        )];

        let nodes = split_documents(&documents, 512, 0).expect("split");

        assert!(!nodes.is_empty());
        for node in &nodes {
            assert_eq!(node.metadata.file_name.as_deref(), Some("baggage.txt"));
            assert_eq!(
                node.metadata.file_path.as_deref(),
                Some("/policies/baggage.txt")
            );
            assert!(node.embedding.is_empty(), "embedding is set at write time");
        }
    }

    #[test]
    fn small_chunks_produce_multiple_nodes() {
        let text = "One sentence here. Another sentence follows. And a third one closes."
            .repeat(8);
        let documents = vec![Document::new("a.txt".into(), "/a.txt".into(), text)];

        let nodes = split_documents(&documents, 16, 4).expect("split");
        assert!(nodes.len() > 1, "expected the text to span several chunks");
    }
}
