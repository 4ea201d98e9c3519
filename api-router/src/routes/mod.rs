pub mod health;
pub mod ingest;
pub mod meta;
pub mod search;
