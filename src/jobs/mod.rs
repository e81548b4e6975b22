//! Ingestion jobs: what a queued run carries and how it is executed

pub mod context;
pub mod handlers;
pub mod types;

pub use context::IngestContext;
pub use handlers::{ingest_symbol, run_ingestion};
pub use types::IngestionJob;
