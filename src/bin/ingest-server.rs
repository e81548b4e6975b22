//! Price Ingestor server
//!
//! HTTP service exposing liveness, trigger, status and metrics endpoints.
//! Triggered runs execute on a background worker pool inside this process.

use dotenvy::dotenv;
use price_ingestor::config::IngestorConfig;
use price_ingestor::core::http::start_server;
use price_ingestor::logging;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();

    logging::init_logging();

    let config = IngestorConfig::from_env()?;
    let env = price_ingestor::config::get_environment();
    info!("Starting Price Ingestor");
    info!(environment = %env, "Environment");
    info!(
        symbols = ?config.symbols,
        period = %config.period,
        table = %config.table,
        write_policy = %config.write_policy,
        "Default ingestion: {} symbols over {} into {}",
        config.symbols.len(),
        config.period,
        config.table
    );
    info!(
        workers = config.runtime.worker_concurrency,
        queue_capacity = config.runtime.queue_capacity,
        overlap_policy = %config.runtime.overlap_policy,
        "Run scheduling"
    );

    let port = config.port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(config).await {
            error!(error = %e, "HTTP server error");
        }
    });

    info!(port = port, "Server started, waiting for shutdown signal...");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutting down Price Ingestor...");
            info!("Price Ingestor stopped");
        }
        _ = server_handle => {
            error!("HTTP server stopped");
        }
    }

    Ok(())
}
