#![allow(clippy::missing_docs_in_private_items)]

pub mod extractors;
pub mod loader;
pub mod pipeline;
pub mod plan;
pub mod splitter;

pub use pipeline::{IngestionOutcome, IngestionPipeline, IngestionRequest};
pub use plan::{ExtractorFlags, Transformation, TransformationPlan};
