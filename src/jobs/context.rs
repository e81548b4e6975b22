//! Job context for dependency injection

use crate::db::PriceSink;
use crate::metrics::Metrics;
use crate::services::market_data::MarketDataProvider;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

/// Everything an ingestion run needs, handed to workers by the runtime.
///
/// `sink` is `None` when no database is configured; runs are then recorded as
/// skipped instead of failing the process.
pub struct IngestContext {
    pub data_provider: Arc<dyn MarketDataProvider + Send + Sync>,
    pub sink: Option<Arc<dyn PriceSink>>,
    pub metrics: Option<Arc<Metrics>>,
    pub table: String,
    fixed_date: Option<NaiveDate>,
}

impl IngestContext {
    pub fn new(
        data_provider: Arc<dyn MarketDataProvider + Send + Sync>,
        sink: Option<Arc<dyn PriceSink>>,
        metrics: Option<Arc<Metrics>>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            data_provider,
            sink,
            metrics,
            table: table.into(),
            fixed_date: None,
        }
    }

    /// Pin the date lookback windows are measured from.
    pub fn with_fixed_date(mut self, date: NaiveDate) -> Self {
        self.fixed_date = Some(date);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.fixed_date.unwrap_or_else(|| Utc::now().date_naive())
    }
}
