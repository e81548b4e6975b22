//! Ingestion run execution
//!
//! A run walks its symbols in order: fetch → normalize → validate → persist.
//! Every stage failure is recorded against its symbol and the run moves on.

use crate::db::PriceSink;
use crate::jobs::context::IngestContext;
use crate::jobs::types::IngestionJob;
use crate::models::{LookbackPeriod, RunSummary, Stage, SymbolOutcome, SymbolReport};
use crate::normalize::{normalize, validate_window};
use crate::services::market_data::FetchError;
use chrono::Utc;
use tracing::{debug, error, info, warn};

pub const SKIPPED_NO_DATABASE: &str = "DATABASE_URL is not set";

/// Execute one queued run to completion and summarize it.
pub async fn run_ingestion(job: IngestionJob, ctx: &IngestContext) -> RunSummary {
    let started_at = Utc::now();
    let period = job.request.period;
    info!(
        run_id = job.run_id,
        symbols = ?job.request.symbols,
        period = %period,
        "Ingestion run {} started for {} symbols",
        job.run_id,
        job.request.symbols.len()
    );

    let Some(sink) = ctx.sink.as_ref() else {
        error!(
            run_id = job.run_id,
            "Ingestion run {} skipped: {}", job.run_id, SKIPPED_NO_DATABASE
        );
        let summary = RunSummary {
            run_id: job.run_id,
            period,
            started_at,
            finished_at: Utc::now(),
            skipped: Some(SKIPPED_NO_DATABASE.to_string()),
            symbols: Vec::new(),
        };
        if let Some(ref metrics) = ctx.metrics {
            metrics.record_run(&summary);
        }
        return summary;
    };

    let mut reports = Vec::with_capacity(job.request.symbols.len());
    for symbol in &job.request.symbols {
        let outcome = ingest_symbol(symbol, period, ctx, sink.as_ref()).await;
        match &outcome {
            SymbolOutcome::Written { rows } => {
                info!(run_id = job.run_id, symbol = %symbol, rows = rows, "{}: wrote {} rows to {}", symbol, rows, ctx.table);
            }
            SymbolOutcome::Empty { reason } => {
                warn!(run_id = job.run_id, symbol = %symbol, reason = %reason, "{}: no data ({})", symbol, reason);
            }
            SymbolOutcome::Failed { stage, message } => {
                error!(run_id = job.run_id, symbol = %symbol, stage = %stage, error = %message, "{}: {} failed: {}", symbol, stage, message);
            }
        }
        reports.push(SymbolReport {
            symbol: symbol.clone(),
            outcome,
        });
    }

    let summary = RunSummary {
        run_id: job.run_id,
        period,
        started_at,
        finished_at: Utc::now(),
        skipped: None,
        symbols: reports,
    };

    info!(
        run_id = summary.run_id,
        rows_written = summary.rows_written(),
        failures = summary.failures(),
        empty = summary.empties(),
        "Ingestion run {} finished: {} rows written, {} failed, {} empty",
        summary.run_id,
        summary.rows_written(),
        summary.failures(),
        summary.empties()
    );

    if let Some(ref metrics) = ctx.metrics {
        metrics.record_run(&summary);
    }
    summary
}

/// Run the pipeline for a single symbol and classify the result.
///
/// A provider reporting no data is `Empty`; any other provider error, and any
/// later stage error, is `Failed` with the stage it came from.
pub async fn ingest_symbol(
    symbol: &str,
    period: LookbackPeriod,
    ctx: &IngestContext,
    sink: &dyn PriceSink,
) -> SymbolOutcome {
    let table = match ctx.data_provider.fetch_daily_bars(symbol, period).await {
        Ok(table) if table.is_empty() => {
            return SymbolOutcome::Empty {
                reason: FetchError::NoData.to_string(),
            }
        }
        Ok(table) => table,
        Err(FetchError::NoData) => {
            return SymbolOutcome::Empty {
                reason: FetchError::NoData.to_string(),
            }
        }
        Err(e) => return failed(Stage::Fetch, e),
    };

    let bars = match normalize(symbol, &table) {
        Ok(bars) => bars,
        Err(e) => return failed(Stage::Normalize, e),
    };
    debug!(symbol = %symbol, bars = bars.len(), "Normalized {} bars for {}", bars.len(), symbol);

    if let Err(e) = validate_window(&bars, period, ctx.today()) {
        return failed(Stage::Validate, e);
    }

    match sink.persist(&ctx.table, &bars).await {
        Ok(rows) => SymbolOutcome::Written { rows },
        Err(e) => failed(Stage::Persist, e),
    }
}

fn failed(stage: Stage, error: impl std::fmt::Display) -> SymbolOutcome {
    SymbolOutcome::Failed {
        stage,
        message: error.to_string(),
    }
}
