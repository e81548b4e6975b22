//! Raw provider table → canonical price bars

pub mod rounding;

use crate::models::{LookbackPeriod, PriceBar};
use crate::services::market_data::{RawTable, RawValue};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use thiserror::Error;

pub use rounding::{round_price, truncate_volume, PRICE_SCALE};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("symbol '{0}' has no identifier before its exchange suffix")]
    EmptySymbol(String),
    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("row {row}: missing {field}")]
    MissingValue { row: usize, field: &'static str },
    #[error("row {row}: invalid {field} value '{value}'")]
    InvalidValue {
        row: usize,
        field: &'static str,
        value: String,
    },
    #[error("bar dated {date} is outside the {period} window {start}..={end}")]
    OutsideWindow {
        date: NaiveDate,
        period: LookbackPeriod,
        start: NaiveDate,
        end: NaiveDate,
    },
}

/// Stored identifier for a provider symbol: everything before the first `.`.
///
/// `"2330.TW"` → `"2330"`, `"AAPL"` → `"AAPL"`. `None` when nothing is left.
pub fn strip_exchange_suffix(symbol: &str) -> Option<&str> {
    let head = symbol.split('.').next().unwrap_or_default().trim();
    if head.is_empty() {
        None
    } else {
        Some(head)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Date,
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Field {
    fn name(self) -> &'static str {
        match self {
            Field::Date => "date",
            Field::Open => "open",
            Field::High => "high",
            Field::Low => "low",
            Field::Close => "close",
            Field::Volume => "volume",
        }
    }

    fn from_column(column: &str) -> Option<Self> {
        match column.trim().to_ascii_lowercase().as_str() {
            "date" | "datetime" | "timestamp" | "time" => Some(Field::Date),
            "open" => Some(Field::Open),
            "high" => Some(Field::High),
            "low" => Some(Field::Low),
            "close" => Some(Field::Close),
            "volume" | "vol" => Some(Field::Volume),
            _ => None,
        }
    }
}

/// Position of each canonical field in the provider's column list.
struct ColumnMap {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
}

impl ColumnMap {
    fn resolve(columns: &[String]) -> Result<Self, NormalizeError> {
        let find = |field: Field| {
            columns
                .iter()
                .position(|c| Field::from_column(c) == Some(field))
                .ok_or(NormalizeError::MissingColumn(field.name()))
        };
        Ok(Self {
            date: find(Field::Date)?,
            open: find(Field::Open)?,
            high: find(Field::High)?,
            low: find(Field::Low)?,
            close: find(Field::Close)?,
            volume: find(Field::Volume)?,
        })
    }
}

/// Convert one symbol's raw table into price bars, one per row, in row order.
///
/// An empty table yields an empty vector. No dedup or reordering happens here.
pub fn normalize(symbol: &str, table: &RawTable) -> Result<Vec<PriceBar>, NormalizeError> {
    if table.is_empty() {
        return Ok(Vec::new());
    }

    let stored_symbol = strip_exchange_suffix(symbol)
        .ok_or_else(|| NormalizeError::EmptySymbol(symbol.to_string()))?;
    let columns = ColumnMap::resolve(&table.columns)?;
    let width = table.columns.len();

    let mut bars = Vec::with_capacity(table.len());
    for (row, cells) in table.rows.iter().enumerate() {
        if cells.len() != width {
            return Err(NormalizeError::RaggedRow {
                row,
                found: cells.len(),
                expected: width,
            });
        }

        bars.push(PriceBar::new(
            stored_symbol,
            coerce_date(&cells[columns.date], row)?,
            coerce_price(&cells[columns.open], row, Field::Open)?,
            coerce_price(&cells[columns.high], row, Field::High)?,
            coerce_price(&cells[columns.low], row, Field::Low)?,
            coerce_price(&cells[columns.close], row, Field::Close)?,
            coerce_volume(&cells[columns.volume], row)?,
        ));
    }

    Ok(bars)
}

/// Reject bars dated outside the window `period` covers when requested on `today`.
pub fn validate_window(
    bars: &[PriceBar],
    period: LookbackPeriod,
    today: NaiveDate,
) -> Result<(), NormalizeError> {
    let (start, end) = period.window(today);
    match bars.iter().find(|bar| bar.date < start || bar.date > end) {
        Some(bar) => Err(NormalizeError::OutsideWindow {
            date: bar.date,
            period,
            start,
            end,
        }),
        None => Ok(()),
    }
}

fn coerce_date(value: &RawValue, row: usize) -> Result<NaiveDate, NormalizeError> {
    match value {
        // Local calendar date at the exchange, offset dropped.
        RawValue::Timestamp(ts) => Ok(ts.date_naive()),
        RawValue::Text(text) => parse_date_text(text.trim()).ok_or_else(|| invalid(row, Field::Date, text)),
        RawValue::Number(n) => Err(invalid(row, Field::Date, n)),
        RawValue::Null => Err(missing(row, Field::Date)),
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|ts| ts.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|ts| ts.date())
        })
}

fn coerce_price(value: &RawValue, row: usize, field: Field) -> Result<Decimal, NormalizeError> {
    let raw = number(value, row, field)?;
    round_price(raw).ok_or_else(|| invalid(row, field, raw))
}

fn coerce_volume(value: &RawValue, row: usize) -> Result<u64, NormalizeError> {
    let raw = number(value, row, Field::Volume)?;
    truncate_volume(raw).ok_or_else(|| invalid(row, Field::Volume, raw))
}

fn number(value: &RawValue, row: usize, field: Field) -> Result<f64, NormalizeError> {
    match value {
        RawValue::Number(n) => Ok(*n),
        RawValue::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid(row, field, text)),
        RawValue::Timestamp(ts) => Err(invalid(row, field, ts)),
        RawValue::Null => Err(missing(row, field)),
    }
}

fn missing(row: usize, field: Field) -> NormalizeError {
    NormalizeError::MissingValue {
        row,
        field: field.name(),
    }
}

fn invalid(row: usize, field: Field, value: impl ToString) -> NormalizeError {
    NormalizeError::InvalidValue {
        row,
        field: field.name(),
        value: value.to_string(),
    }
}
