use std::path::PathBuf;

use axum::{extract::State, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use ingestion_pipeline::{ExtractorFlags, IngestionRequest};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

const MIN_CHUNK_SIZE: usize = 100;
const MAX_CHUNK_SIZE: usize = 2000;
const MAX_CHUNK_OVERLAP: usize = 500;

#[derive(Debug, Deserialize)]
pub struct IngestParams {
    /// Directory to ingest; the configured data directory when omitted.
    pub input_dir: Option<String>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_true")]
    pub extract_title: bool,
    #[serde(default = "default_true")]
    pub extract_qa: bool,
    #[serde(default = "default_true")]
    pub extract_keywords: bool,
    #[serde(default = "default_true")]
    pub extract_summary: bool,
}

fn default_chunk_size() -> usize {
    512
}

fn default_chunk_overlap() -> usize {
    128
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub success: bool,
    pub message: String,
    pub documents_processed: usize,
    pub nodes_created: usize,
    pub processing_time_seconds: f64,
    pub timestamp: DateTime<Utc>,
}

impl IngestParams {
    /// Field bounds checked before any pipeline work starts.
    fn validate(&self) -> Result<(), ApiError> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(ApiError::ValidationError(format!(
                "chunk_size must be between {MIN_CHUNK_SIZE} and {MAX_CHUNK_SIZE}, got {}",
                self.chunk_size
            )));
        }
        if self.chunk_overlap > MAX_CHUNK_OVERLAP {
            return Err(ApiError::ValidationError(format!(
                "chunk_overlap must be at most {MAX_CHUNK_OVERLAP}, got {}",
                self.chunk_overlap
            )));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ApiError::ValidationError(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

pub async fn ingest(
    State(state): State<ApiState>,
    Json(params): Json<IngestParams>,
) -> Result<impl IntoResponse, ApiError> {
    params.validate()?;

    let input_dir = params
        .input_dir
        .clone()
        .unwrap_or_else(|| state.config.data_dir.clone());

    info!(
        %input_dir,
        chunk_size = params.chunk_size,
        chunk_overlap = params.chunk_overlap,
        "received ingestion request"
    );

    let request = IngestionRequest {
        input_dir: PathBuf::from(input_dir),
        chunk_size: params.chunk_size,
        chunk_overlap: params.chunk_overlap,
        extractors: ExtractorFlags {
            title: params.extract_title,
            qa: params.extract_qa,
            keywords: params.extract_keywords,
            summary: params.extract_summary,
        },
    };

    let outcome = state.pipeline.run(request).await?;

    Ok(Json(IngestResponse {
        success: true,
        message: format!(
            "Indexed {} nodes from {} documents",
            outcome.nodes_indexed, outcome.documents_loaded
        ),
        documents_processed: outcome.documents_loaded,
        nodes_created: outcome.nodes_indexed,
        processing_time_seconds: outcome.processing_time_seconds,
        timestamp: Utc::now(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(chunk_size: usize, chunk_overlap: usize) -> IngestParams {
        IngestParams {
            input_dir: None,
            chunk_size,
            chunk_overlap,
            extract_title: true,
            extract_qa: true,
            extract_keywords: true,
            extract_summary: true,
        }
    }

    #[test]
    fn defaults_fill_in_everything_but_the_directory() {
        let parsed: IngestParams = serde_json::from_str("{}").expect("parse");
        assert_eq!(parsed.chunk_size, 512);
        assert_eq!(parsed.chunk_overlap, 128);
        assert!(parsed.extract_title);
        assert!(parsed.extract_summary);
        assert!(parsed.input_dir.is_none());
        parsed.validate().expect("defaults are valid");
    }

    #[test]
    fn chunk_size_bounds_are_enforced() {
        assert!(params(99, 0).validate().is_err());
        assert!(params(100, 0).validate().is_ok());
        assert!(params(2000, 128).validate().is_ok());
        assert!(params(2001, 128).validate().is_err());
    }

    #[test]
    fn chunk_overlap_bounds_are_enforced() {
        assert!(params(1000, 500).validate().is_ok());
        assert!(params(1000, 501).validate().is_err());
    }

    #[test]
    fn overlap_must_stay_below_chunk_size() {
        assert!(params(200, 199).validate().is_ok());
        assert!(params(200, 200).validate().is_err());
        assert!(params(200, 300).validate().is_err());
    }
}
