//! Job types for the ingestion queue

use crate::models::IngestionRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One accepted trigger waiting for, or held by, a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionJob {
    pub run_id: u64,
    pub request: IngestionRequest,
    pub enqueued_at: DateTime<Utc>,
}

impl IngestionJob {
    pub fn new(run_id: u64, request: IngestionRequest) -> Self {
        Self {
            run_id,
            request,
            enqueued_at: Utc::now(),
        }
    }
}
