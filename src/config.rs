//! Environment-driven configuration
//!
//! Values come from the process environment (after `dotenvy` has loaded any
//! `.env` file). A missing `DATABASE_URL` is not an error here: the service
//! starts and every triggered run is recorded as skipped.

use crate::core::runtime::{OverlapPolicy, RuntimeConfig};
use crate::db::{validate_table_name, WritePolicy};
use crate::models::LookbackPeriod;
use crate::services::yahoo::DEFAULT_BASE_URL;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_TABLE: &str = "daily_prices";
pub const DEFAULT_SYMBOLS: &str = "2330.TW";

#[derive(Debug, Error)]
#[error("invalid value for {name}: {message}")]
pub struct ConfigError {
    pub name: &'static str,
    pub message: String,
}

/// Deployment environment name, used to pick the log format.
pub fn get_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string())
}

#[derive(Debug, Clone)]
pub struct IngestorConfig {
    pub database_url: Option<String>,
    pub port: u16,
    pub symbols: Vec<String>,
    pub period: LookbackPeriod,
    pub table: String,
    pub write_policy: WritePolicy,
    pub ensure_schema: bool,
    pub pool_size: usize,
    pub runtime: RuntimeConfig,
    pub provider_base_url: String,
    pub fetch_timeout: Duration,
}

impl Default for IngestorConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            port: DEFAULT_PORT,
            symbols: parse_symbols(DEFAULT_SYMBOLS),
            period: LookbackPeriod::default(),
            table: DEFAULT_TABLE.to_string(),
            write_policy: WritePolicy::default(),
            ensure_schema: false,
            pool_size: 4,
            runtime: RuntimeConfig::default(),
            provider_base_url: DEFAULT_BASE_URL.to_string(),
            fetch_timeout: Duration::from_secs(15),
        }
    }
}

impl IngestorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let symbols = get("SYMBOLS")
            .map(|s| parse_symbols(&s))
            .unwrap_or(defaults.symbols);
        if symbols.is_empty() {
            return Err(ConfigError {
                name: "SYMBOLS",
                message: "no symbols listed".to_string(),
            });
        }

        let table = get("PRICE_TABLE").unwrap_or(defaults.table);
        validate_table_name(&table).map_err(|e| ConfigError {
            name: "PRICE_TABLE",
            message: e.to_string(),
        })?;

        let runtime = RuntimeConfig {
            worker_concurrency: parse_or("WORKER_CONCURRENCY", get("WORKER_CONCURRENCY"), defaults.runtime.worker_concurrency)?,
            queue_capacity: parse_or("TRIGGER_QUEUE_CAPACITY", get("TRIGGER_QUEUE_CAPACITY"), defaults.runtime.queue_capacity)?,
            overlap_policy: parse_or("TRIGGER_OVERLAP_POLICY", get("TRIGGER_OVERLAP_POLICY"), defaults.runtime.overlap_policy)?,
        };
        if runtime.worker_concurrency == 0 || runtime.queue_capacity == 0 {
            return Err(ConfigError {
                name: "WORKER_CONCURRENCY/TRIGGER_QUEUE_CAPACITY",
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            database_url: get("DATABASE_URL"),
            port: parse_or("PORT", get("PORT"), defaults.port)?,
            symbols,
            period: parse_or("LOOKBACK_PERIOD", get("LOOKBACK_PERIOD"), defaults.period)?,
            table,
            write_policy: parse_or("WRITE_POLICY", get("WRITE_POLICY"), defaults.write_policy)?,
            ensure_schema: parse_or("ENSURE_SCHEMA", get("ENSURE_SCHEMA"), defaults.ensure_schema)?,
            pool_size: parse_or("DB_POOL_SIZE", get("DB_POOL_SIZE"), defaults.pool_size)?,
            runtime,
            provider_base_url: get("PROVIDER_BASE_URL").unwrap_or(defaults.provider_base_url),
            fetch_timeout: Duration::from_secs(parse_or(
                "FETCH_TIMEOUT_SECONDS",
                get("FETCH_TIMEOUT_SECONDS"),
                defaults.fetch_timeout.as_secs(),
            )?),
        })
    }
}

/// Split a comma-separated symbol list, dropping blanks.
pub fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_or<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError {
            name,
            message: format!("'{}': {}", raw, e),
        }),
        None => Ok(default),
    }
}
