//! PostgreSQL price table writes through a verified connection pool

use crate::db::sink::{validate_table_name, PersistError, PriceSink, WritePolicy};
use crate::models::PriceBar;
use chrono::NaiveDate;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use tokio_postgres::types::ToSql;
use tracing::{debug, info};

/// Columns written, in bind order.
pub const COLUMNS: [&str; 7] = ["date", "symbol", "open", "high", "low", "close", "volume"];

// Stays well under PostgreSQL's 65535 bind parameters per statement.
const MAX_ROWS_PER_STATEMENT: usize = 1000;

const POOL_WAIT_TIMEOUT: Duration = Duration::from_secs(10);
const POOL_CREATE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct PostgresPriceSink {
    pool: Pool,
    policy: WritePolicy,
}

impl PostgresPriceSink {
    /// Build a pool for `database_url`. No connection is opened until first use.
    ///
    /// Every checkout runs a liveness query first (`RecyclingMethod::Verified`),
    /// so connections the server dropped while idle are replaced, not handed out.
    /// TLS is negotiated when the server offers it (`sslmode=prefer` by default).
    pub fn connect(
        database_url: &str,
        max_size: usize,
        policy: WritePolicy,
    ) -> Result<Self, PersistError> {
        let pg_config = tokio_postgres::Config::from_str(database_url)
            .map_err(|e| PersistError::Setup(format!("invalid DATABASE_URL: {}", e)))?;
        let connector = TlsConnector::new().map_err(|e| PersistError::Setup(e.to_string()))?;
        let manager = Manager::from_config(
            pg_config,
            MakeTlsConnector::new(connector),
            ManagerConfig {
                recycling_method: RecyclingMethod::Verified,
            },
        );
        let pool = Pool::builder(manager)
            .max_size(max_size.max(1))
            .runtime(Runtime::Tokio1)
            .wait_timeout(Some(POOL_WAIT_TIMEOUT))
            .create_timeout(Some(POOL_CREATE_TIMEOUT))
            .build()
            .map_err(|e| PersistError::Setup(e.to_string()))?;

        info!(max_size = max_size.max(1), policy = %policy, "PostgreSQL pool configured");
        Ok(Self::with_pool(pool, policy))
    }

    pub fn with_pool(pool: Pool, policy: WritePolicy) -> Self {
        Self { pool, policy }
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<(), PersistError> {
        let client = self.pool.get().await?;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }

    /// Create the price table if missing, plus the `(symbol, date)` unique
    /// index when the policy relies on it.
    pub async fn ensure_schema(&self, table: &str) -> Result<(), PersistError> {
        validate_table_name(table)?;
        let client = self.pool.get().await?;
        client
            .batch_execute(&create_table_statement(table))
            .await?;
        if self.policy == WritePolicy::SkipExisting {
            client
                .batch_execute(&create_unique_index_statement(table))
                .await?;
        }
        info!(table = %table, policy = %self.policy, "Price table schema ensured");
        Ok(())
    }
}

#[async_trait::async_trait]
impl PriceSink for PostgresPriceSink {
    async fn persist(&self, table: &str, bars: &[PriceBar]) -> Result<u64, PersistError> {
        if bars.is_empty() {
            return Ok(0);
        }
        validate_table_name(table)?;

        let rows = bars
            .iter()
            .map(SqlRow::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        let mut written = 0;
        for chunk in rows.chunks(MAX_ROWS_PER_STATEMENT) {
            let sql = insert_statement(table, chunk.len(), self.policy);
            let params: Vec<&(dyn ToSql + Sync)> = chunk.iter().flat_map(SqlRow::params).collect();
            written += tx.execute(sql.as_str(), &params).await?;
        }
        tx.commit().await?;

        debug!(table = %table, rows = written, "Inserted price rows");
        Ok(written)
    }
}

/// Bind values for one bar, converted to the column types.
struct SqlRow {
    date: NaiveDate,
    symbol: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
}

impl SqlRow {
    fn params(&self) -> [&(dyn ToSql + Sync); 7] {
        [
            &self.date,
            &self.symbol,
            &self.open,
            &self.high,
            &self.low,
            &self.close,
            &self.volume,
        ]
    }
}

impl TryFrom<&PriceBar> for SqlRow {
    type Error = PersistError;

    fn try_from(bar: &PriceBar) -> Result<Self, Self::Error> {
        Ok(Self {
            date: bar.date,
            symbol: bar.symbol.clone(),
            open: price_column("open", bar.open)?,
            high: price_column("high", bar.high)?,
            low: price_column("low", bar.low)?,
            close: price_column("close", bar.close)?,
            volume: i64::try_from(bar.volume).map_err(|_| PersistError::Overflow {
                field: "volume",
                value: bar.volume.to_string(),
            })?,
        })
    }
}

fn price_column(field: &'static str, value: Decimal) -> Result<f64, PersistError> {
    value.to_f64().ok_or_else(|| PersistError::Overflow {
        field,
        value: value.to_string(),
    })
}

/// Multi-row insert with `rows` value tuples. The table name must be validated.
pub fn insert_statement(table: &str, rows: usize, policy: WritePolicy) -> String {
    let width = COLUMNS.len();
    let tuples: Vec<String> = (0..rows)
        .map(|row| {
            let placeholders: Vec<String> = (1..=width)
                .map(|col| format!("${}", row * width + col))
                .collect();
            format!("({})", placeholders.join(", "))
        })
        .collect();

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        table,
        COLUMNS.join(", "),
        tuples.join(", ")
    );
    if policy == WritePolicy::SkipExisting {
        sql.push_str(" ON CONFLICT (symbol, date) DO NOTHING");
    }
    sql
}

pub fn create_table_statement(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            date DATE NOT NULL,
            symbol TEXT NOT NULL,
            open DOUBLE PRECISION,
            high DOUBLE PRECISION,
            low DOUBLE PRECISION,
            close DOUBLE PRECISION,
            volume BIGINT
        )",
        table
    )
}

pub fn create_unique_index_statement(table: &str) -> String {
    let bare = table.rsplit('.').next().unwrap_or(table);
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {}_symbol_date_key ON {} (symbol, date)",
        bare, table
    )
}
