//! REST client for daily bars from the Yahoo Finance chart API

use crate::models::LookbackPeriod;
use crate::services::market_data::{FetchError, MarketDataProvider, RawTable, RawValue};
use chrono::{DateTime, FixedOffset};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::messages::ChartResponse;

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

// The chart endpoint answers 429 to clients without a browser-like agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) price-ingestor/0.1";

/// Column names of the tables this provider produces.
pub const COLUMNS: [&str; 6] = ["Date", "Open", "High", "Low", "Close", "Volume"];

pub struct YahooChartClient {
    base_url: String,
    http: reqwest::Client,
}

impl YahooChartClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self::with_client(base_url, http))
    }

    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    fn chart_url(&self, symbol: &str, period: LookbackPeriod) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| FetchError::Decode(format!("invalid base url '{}': {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::Decode(format!("base url '{}' cannot have a path", self.base_url)))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        url.query_pairs_mut()
            .append_pair("range", period.as_str())
            .append_pair("interval", "1d");
        Ok(url)
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for YahooChartClient {
    async fn fetch_daily_bars(
        &self,
        symbol: &str,
        period: LookbackPeriod,
    ) -> Result<RawTable, FetchError> {
        let url = self.chart_url(symbol, period)?;
        debug!(symbol = %symbol, period = %period, url = %url, "Requesting daily bars");

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }

        let body = response.text().await?;
        let parsed: ChartResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) if status.is_success() => return Err(FetchError::Decode(e.to_string())),
            Err(_) => {
                return Err(FetchError::Provider {
                    code: status.as_u16().to_string(),
                    description: body.chars().take(200).collect(),
                })
            }
        };

        let table = chart_to_table(parsed)?;
        debug!(symbol = %symbol, rows = table.len(), "Received daily bars");
        Ok(table)
    }
}

/// Convert a chart payload into a raw table.
///
/// Timestamps are localized with the exchange offset. Rows whose four prices
/// are all null are provider placeholders and are dropped.
pub fn chart_to_table(response: ChartResponse) -> Result<RawTable, FetchError> {
    let chart = response.chart;
    if let Some(err) = chart.error {
        return Err(FetchError::Provider {
            code: err.code,
            description: err.description.unwrap_or_default(),
        });
    }

    let result = chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or(FetchError::NoData)?;
    if result.timestamp.is_empty() {
        return Err(FetchError::NoData);
    }

    let offset = FixedOffset::east_opt(result.meta.gmtoffset).ok_or_else(|| {
        FetchError::Decode(format!("invalid gmtoffset {}", result.meta.gmtoffset))
    })?;
    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .unwrap_or_default();

    let mut table = RawTable::new(COLUMNS);
    for (i, ts) in result.timestamp.iter().enumerate() {
        let prices = [
            cell(&quote.open, i),
            cell(&quote.high, i),
            cell(&quote.low, i),
            cell(&quote.close, i),
        ];
        if prices.iter().all(Option::is_none) {
            continue;
        }

        let at = DateTime::from_timestamp(*ts, 0)
            .ok_or_else(|| FetchError::Decode(format!("timestamp {} out of range", ts)))?
            .with_timezone(&offset);

        let mut row = Vec::with_capacity(COLUMNS.len());
        row.push(RawValue::Timestamp(at));
        row.extend(prices.into_iter().map(RawValue::from));
        row.push(RawValue::from(cell(&quote.volume, i)));
        table.push_row(row);
    }

    if table.is_empty() {
        return Err(FetchError::NoData);
    }
    Ok(table)
}

fn cell(column: &[Option<f64>], i: usize) -> Option<f64> {
    column.get(i).copied().flatten()
}
