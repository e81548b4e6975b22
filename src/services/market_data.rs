//! Market data provider interface and the raw table it hands back.

use crate::models::LookbackPeriod;
use chrono::{DateTime, FixedOffset};
use thiserror::Error;

/// A single cell of a provider table.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Timestamp(DateTime<FixedOffset>),
    Number(f64),
    Text(String),
    Null,
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<Option<f64>> for RawValue {
    fn from(value: Option<f64>) -> Self {
        value.map(RawValue::Number).unwrap_or(RawValue::Null)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<DateTime<FixedOffset>> for RawValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        RawValue::Timestamp(value)
    }
}

/// Provider response for one symbol, column names as the provider spells them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<RawValue>>,
}

impl RawTable {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_row(mut self, row: Vec<RawValue>) -> Self {
        self.rows.push(row);
        self
    }

    pub fn push_row(&mut self, row: Vec<RawValue>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("provider returned no data")]
    NoData,
    #[error("provider rate limit hit")]
    RateLimited,
    #[error("provider error {code}: {description}")]
    Provider { code: String, description: String },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unreadable provider response: {0}")]
    Decode(String),
}

/// Fetches daily bars for one symbol over one lookback window.
///
/// Errors are values: the caller decides whether a symbol counts as empty or
/// failed, and nothing here retries.
#[async_trait::async_trait]
pub trait MarketDataProvider {
    async fn fetch_daily_bars(
        &self,
        symbol: &str,
        period: LookbackPeriod,
    ) -> Result<RawTable, FetchError>;
}
