//! One-shot ingestion
//!
//! Runs a single ingestion synchronously and prints the run summary as JSON.
//!
//! Usage: `ingest-once [--dry-run] [--period 1mo] [SYMBOL ...]`
//!
//! Without symbols the `SYMBOLS` setting is used. `--dry-run` writes to an
//! in-memory table instead of the database.

use dotenvy::dotenv;
use price_ingestor::config::IngestorConfig;
use price_ingestor::core::http::connect_sink;
use price_ingestor::db::{MemoryPriceSink, PriceSink};
use price_ingestor::jobs::{run_ingestion, IngestContext, IngestionJob};
use price_ingestor::logging;
use price_ingestor::models::{IngestionRequest, LookbackPeriod};
use price_ingestor::services::market_data::MarketDataProvider;
use price_ingestor::services::yahoo::YahooChartClient;
use std::env;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    logging::init_logging();

    let config = IngestorConfig::from_env()?;

    let mut dry_run = false;
    let mut period = config.period;
    let mut symbols = Vec::new();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dry-run" => dry_run = true,
            "--period" => {
                let raw = args.next().ok_or("--period needs a value")?;
                period = raw.parse::<LookbackPeriod>()?;
            }
            _ => symbols.push(arg),
        }
    }
    if symbols.is_empty() {
        symbols = config.symbols.clone();
    }

    let provider: Arc<dyn MarketDataProvider + Send + Sync> = Arc::new(YahooChartClient::new(
        config.provider_base_url.clone(),
        config.fetch_timeout,
    )?);
    let sink: Option<Arc<dyn PriceSink>> = if dry_run {
        info!("Dry run: rows go to an in-memory table");
        Some(Arc::new(MemoryPriceSink::new()))
    } else {
        connect_sink(&config).await
    };

    let ctx = IngestContext::new(provider, sink, None, config.table.clone());
    let job = IngestionJob::new(1, IngestionRequest::new(symbols, period));
    let summary = run_ingestion(job, &ctx).await;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    if summary.failures() > 0 || summary.is_skipped() {
        std::process::exit(1);
    }
    Ok(())
}
