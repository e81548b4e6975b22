//! Persistence sink interface, write policies and the in-memory sink

use crate::models::PriceBar;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("invalid table name '{0}'")]
    InvalidTable(String),
    #[error("failed to acquire database connection: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),
    #[error("{field} value {value} does not fit the price table")]
    Overflow { field: &'static str, value: String },
    #[error("database setup failed: {0}")]
    Setup(String),
}

/// How rows are written relative to rows already in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// Insert every row; overlapping runs leave duplicate `(symbol, date)` rows.
    #[default]
    Append,
    /// Skip rows whose `(symbol, date)` already exists. Needs a unique index.
    SkipExisting,
}

impl FromStr for WritePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" => Ok(WritePolicy::Append),
            "skip-existing" | "skip_existing" => Ok(WritePolicy::SkipExisting),
            other => Err(format!(
                "unknown write policy '{}' (expected append or skip-existing)",
                other
            )),
        }
    }
}

impl fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WritePolicy::Append => f.write_str("append"),
            WritePolicy::SkipExisting => f.write_str("skip-existing"),
        }
    }
}

/// Destination for normalized bars.
#[async_trait::async_trait]
pub trait PriceSink: Send + Sync {
    /// Write `bars` to `table`, returning the number of rows inserted.
    ///
    /// An empty slice is a no-op returning `Ok(0)`.
    async fn persist(&self, table: &str, bars: &[PriceBar]) -> Result<u64, PersistError>;
}

/// Accepts `name` or `schema.name`, each part a plain SQL identifier.
pub fn validate_table_name(table: &str) -> Result<(), PersistError> {
    let parts: Vec<&str> = table.split('.').collect();
    let valid = parts.len() <= 2 && parts.iter().all(|part| is_identifier(part));
    if valid {
        Ok(())
    } else {
        Err(PersistError::InvalidTable(table.to_string()))
    }
}

fn is_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    part.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// In-process sink keeping rows per table. Same policy semantics as Postgres.
#[derive(Default)]
pub struct MemoryPriceSink {
    policy: WritePolicy,
    tables: RwLock<HashMap<String, Vec<PriceBar>>>,
}

impl MemoryPriceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: WritePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub async fn rows(&self, table: &str) -> Vec<PriceBar> {
        let tables = self.tables.read().await;
        tables.get(table).cloned().unwrap_or_default()
    }

    pub async fn row_count(&self, table: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(table).map(Vec::len).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl PriceSink for MemoryPriceSink {
    async fn persist(&self, table: &str, bars: &[PriceBar]) -> Result<u64, PersistError> {
        if bars.is_empty() {
            return Ok(0);
        }
        validate_table_name(table)?;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        let written = match self.policy {
            WritePolicy::Append => {
                rows.extend_from_slice(bars);
                bars.len()
            }
            WritePolicy::SkipExisting => {
                let mut seen: HashSet<(String, chrono::NaiveDate)> =
                    rows.iter().map(|b| (b.symbol.clone(), b.date)).collect();
                let before = rows.len();
                for bar in bars {
                    if seen.insert((bar.symbol.clone(), bar.date)) {
                        rows.push(bar.clone());
                    }
                }
                rows.len() - before
            }
        };
        Ok(written as u64)
    }
}
