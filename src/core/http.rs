//! HTTP endpoint server using Axum

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, warn, Level};

use crate::config::{parse_symbols, IngestorConfig};
use crate::core::runtime::{IngestRuntime, TriggerError};
use crate::db::{PostgresPriceSink, PriceSink};
use crate::jobs::context::IngestContext;
use crate::metrics::Metrics;
use crate::models::{IngestionRequest, LookbackPeriod};
use crate::services::market_data::MarketDataProvider;
use crate::services::yahoo::YahooChartClient;

pub const SERVICE_NAME: &str = "price-ingestor";

#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
    pub runtime: Arc<IngestRuntime>,
    /// Symbols and period used when a trigger does not name its own.
    pub defaults: Arc<IngestionRequest>,
}

/// Liveness. Static payload only: no database, no queue, no locks.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "online",
        "waiting_for": "trigger",
        "service": SERVICE_NAME,
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Middleware to track HTTP request metrics
async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();
    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();
    state.metrics.http_requests_in_flight.dec();

    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(duration.as_secs_f64());

    if status.is_server_error() {
        error!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = duration.as_millis(),
            "HTTP request error"
        );
    }

    response
}

#[derive(Debug, Default, Deserialize)]
pub struct TriggerQuery {
    /// Comma-separated provider symbols, e.g. `2330.TW,2317.TW`.
    pub symbols: Option<String>,
    pub period: Option<String>,
}

impl TriggerQuery {
    /// Merge with the configured defaults. Unknown periods are refused.
    pub fn into_request(self, defaults: &IngestionRequest) -> Result<IngestionRequest, String> {
        let symbols = match self.symbols {
            Some(raw) => parse_symbols(&raw),
            None => defaults.symbols.clone(),
        };
        let period = match self.period {
            Some(raw) => raw.parse::<LookbackPeriod>().map_err(|e| e.to_string())?,
            None => defaults.period,
        };
        Ok(IngestionRequest::new(symbols, period))
    }
}

/// Schedule one ingestion run and answer before it executes.
async fn trigger_run(
    State(state): State<AppState>,
    Query(params): Query<TriggerQuery>,
) -> impl IntoResponse {
    let request = match params.into_request(&state.defaults) {
        Ok(request) => request,
        Err(message) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "accepted": false, "message": message })),
            )
        }
    };

    match state.runtime.trigger(request) {
        Ok(ticket) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "accepted": true,
                "run_id": ticket.run_id,
                "symbols": ticket.symbols,
                "period": ticket.period,
                "message": "Ingestion run scheduled in the background",
            })),
        ),
        Err(e) => {
            let status = match e {
                TriggerError::Busy | TriggerError::QueueFull(_) => StatusCode::TOO_MANY_REQUESTS,
                TriggerError::NoSymbols => StatusCode::BAD_REQUEST,
                TriggerError::Closed => StatusCode::SERVICE_UNAVAILABLE,
            };
            (
                status,
                Json(json!({ "accepted": false, "message": e.to_string() })),
            )
        }
    }
}

/// Queue state and the most recent run summary.
async fn run_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.runtime.status().await))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/trigger", get(trigger_run).post(trigger_run))
        .route("/update", get(trigger_run))
        .route("/status", get(run_status))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Wire provider, sink, metrics and runtime from configuration.
///
/// Database problems are logged and leave the sink unset; they never stop
/// the service from starting.
pub async fn build_state(
    config: &IngestorConfig,
) -> Result<(AppState, Vec<tokio::task::JoinHandle<()>>), Box<dyn std::error::Error + Send + Sync>>
{
    let metrics = Arc::new(Metrics::new().map_err(|e| e.to_string())?);

    let provider: Arc<dyn MarketDataProvider + Send + Sync> = Arc::new(YahooChartClient::new(
        config.provider_base_url.clone(),
        config.fetch_timeout,
    )?);

    let sink = connect_sink(config).await;
    metrics
        .database_configured
        .set(if sink.is_some() { 1.0 } else { 0.0 });

    let job_context = Arc::new(IngestContext::new(
        provider,
        sink,
        Some(metrics.clone()),
        config.table.clone(),
    ));
    let runtime = Arc::new(IngestRuntime::new(config.runtime.clone(), job_context));
    let handles = runtime.start_workers();

    let state = AppState {
        metrics,
        start_time: Arc::new(Instant::now()),
        runtime,
        defaults: Arc::new(IngestionRequest::new(config.symbols.clone(), config.period)),
    };
    Ok((state, handles))
}

/// Build the PostgreSQL sink, or `None` when it cannot be configured.
pub async fn connect_sink(config: &IngestorConfig) -> Option<Arc<dyn PriceSink>> {
    let Some(ref url) = config.database_url else {
        warn!("DATABASE_URL is not set - triggered runs will be skipped");
        return None;
    };

    let sink = match PostgresPriceSink::connect(url, config.pool_size, config.write_policy) {
        Ok(sink) => sink,
        Err(e) => {
            error!(error = %e, "Failed to configure database pool - triggered runs will be skipped");
            return None;
        }
    };

    match tokio::time::timeout(Duration::from_secs(15), sink.ping()).await {
        Ok(Ok(())) => info!("Database reachable"),
        Ok(Err(e)) => warn!(error = %e, "Database not reachable yet - will retry on each run"),
        Err(_) => warn!("Database ping timed out - will retry on each run"),
    }

    if config.ensure_schema {
        if let Err(e) = sink.ensure_schema(&config.table).await {
            warn!(error = %e, table = %config.table, "Failed to ensure price table schema");
        }
    }

    Some(Arc::new(sink))
}

pub async fn start_server(config: IngestorConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (state, _worker_handles) = build_state(&config).await?;
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;

    info!(port = config.port, "HTTP server listening on port {}", config.port);
    info!(
        "Trigger ingestion with GET http://0.0.0.0:{}/trigger",
        config.port
    );
    axum::serve(listener, app).await?;

    Ok(())
}
