//! Prometheus metrics for the HTTP surface and ingestion runs

use crate::models::RunSummary;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,
    pub http_requests_total: IntCounter,
    pub http_request_duration_seconds: Histogram,
    pub http_requests_in_flight: IntGauge,
    pub ingestion_runs_total: IntCounter,
    pub ingestion_runs_rejected_total: IntCounter,
    pub ingestion_runs_pending: IntGauge,
    pub ingestion_symbols_total: IntCounterVec,
    pub ingestion_rows_written_total: IntCounter,
    pub ingestion_run_duration_seconds: Histogram,
    pub database_configured: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total =
            IntCounter::new("http_requests_total", "Total HTTP requests handled")?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        ))?;
        let http_requests_in_flight =
            IntGauge::new("http_requests_in_flight", "HTTP requests currently being served")?;
        let ingestion_runs_total =
            IntCounter::new("ingestion_runs_total", "Ingestion runs completed")?;
        let ingestion_runs_rejected_total = IntCounter::new(
            "ingestion_runs_rejected_total",
            "Trigger requests refused by the overlap policy",
        )?;
        let ingestion_runs_pending =
            IntGauge::new("ingestion_runs_pending", "Ingestion runs queued or executing")?;
        let ingestion_symbols_total = IntCounterVec::new(
            Opts::new("ingestion_symbols_total", "Symbols processed, by outcome"),
            &["outcome"],
        )?;
        let ingestion_rows_written_total = IntCounter::new(
            "ingestion_rows_written_total",
            "Price rows written to the database",
        )?;
        let ingestion_run_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "ingestion_run_duration_seconds",
                "Wall time of one ingestion run",
            )
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        )?;
        let database_configured = Gauge::new(
            "database_configured",
            "1 when a database connection string is configured",
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(ingestion_runs_total.clone()))?;
        registry.register(Box::new(ingestion_runs_rejected_total.clone()))?;
        registry.register(Box::new(ingestion_runs_pending.clone()))?;
        registry.register(Box::new(ingestion_symbols_total.clone()))?;
        registry.register(Box::new(ingestion_rows_written_total.clone()))?;
        registry.register(Box::new(ingestion_run_duration_seconds.clone()))?;
        registry.register(Box::new(database_configured.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
            ingestion_runs_total,
            ingestion_runs_rejected_total,
            ingestion_runs_pending,
            ingestion_symbols_total,
            ingestion_rows_written_total,
            ingestion_run_duration_seconds,
            database_configured,
        })
    }

    /// Fold a finished run into the counters.
    pub fn record_run(&self, summary: &RunSummary) {
        self.ingestion_runs_total.inc();
        for report in &summary.symbols {
            self.ingestion_symbols_total
                .with_label_values(&[report.outcome.label()])
                .inc();
        }
        self.ingestion_rows_written_total.inc_by(summary.rows_written());
        let elapsed = (summary.finished_at - summary.started_at)
            .to_std()
            .unwrap_or_default();
        self.ingestion_run_duration_seconds
            .observe(elapsed.as_secs_f64());
    }

    /// Render the registry in the Prometheus text format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
