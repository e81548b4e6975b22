//! Run-level models: what a trigger asks for and what a run reports back.

use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Trailing window of daily bars requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LookbackPeriod {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
    #[default]
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported lookback period '{0}' (expected one of 1d, 5d, 1mo, 3mo, 6mo, 1y)")]
pub struct ParsePeriodError(pub String);

impl LookbackPeriod {
    /// Provider range token.
    pub fn as_str(&self) -> &'static str {
        match self {
            LookbackPeriod::OneDay => "1d",
            LookbackPeriod::FiveDays => "5d",
            LookbackPeriod::OneMonth => "1mo",
            LookbackPeriod::ThreeMonths => "3mo",
            LookbackPeriod::SixMonths => "6mo",
            LookbackPeriod::OneYear => "1y",
        }
    }

    /// Inclusive calendar window a bar may fall in when requested on `today`.
    ///
    /// Day-based periods count trading days at the provider, so their calendar
    /// span is widened to cover weekends and multi-day exchange closures such
    /// as the Lunar New Year break. Both ends carry
    /// one day of slack for the exchange-local vs UTC date difference.
    pub fn window(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let start = match self {
            LookbackPeriod::OneDay => today.checked_sub_days(Days::new(21)),
            LookbackPeriod::FiveDays => today.checked_sub_days(Days::new(28)),
            LookbackPeriod::OneMonth => today.checked_sub_months(Months::new(1)),
            LookbackPeriod::ThreeMonths => today.checked_sub_months(Months::new(3)),
            LookbackPeriod::SixMonths => today.checked_sub_months(Months::new(6)),
            LookbackPeriod::OneYear => today.checked_sub_months(Months::new(12)),
        }
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .unwrap_or(NaiveDate::MIN);
        let end = today.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX);
        (start, end)
    }
}

impl FromStr for LookbackPeriod {
    type Err = ParsePeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1d" => Ok(LookbackPeriod::OneDay),
            "5d" => Ok(LookbackPeriod::FiveDays),
            "1mo" => Ok(LookbackPeriod::OneMonth),
            "3mo" => Ok(LookbackPeriod::ThreeMonths),
            "6mo" => Ok(LookbackPeriod::SixMonths),
            "1y" => Ok(LookbackPeriod::OneYear),
            _ => Err(ParsePeriodError(s.to_string())),
        }
    }
}

impl fmt::Display for LookbackPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One trigger's worth of work: symbols in processing order plus a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionRequest {
    pub symbols: Vec<String>,
    #[serde(default)]
    pub period: LookbackPeriod,
}

impl IngestionRequest {
    pub fn new(symbols: Vec<String>, period: LookbackPeriod) -> Self {
        Self { symbols, period }
    }
}

/// Pipeline stage a per-symbol failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Normalize,
    Validate,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Normalize => "normalize",
            Stage::Validate => "validate",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SymbolOutcome {
    Written { rows: u64 },
    Empty { reason: String },
    Failed { stage: Stage, message: String },
}

impl SymbolOutcome {
    /// Label used for logs and the `outcome` metric dimension.
    pub fn label(&self) -> &'static str {
        match self {
            SymbolOutcome::Written { .. } => "written",
            SymbolOutcome::Empty { .. } => "empty",
            SymbolOutcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolReport {
    pub symbol: String,
    #[serde(flatten)]
    pub outcome: SymbolOutcome,
}

/// Result of one orchestrator invocation. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: u64,
    pub period: LookbackPeriod,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Set when the whole run was skipped, e.g. no database configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
    pub symbols: Vec<SymbolReport>,
}

impl RunSummary {
    pub fn rows_written(&self) -> u64 {
        self.symbols
            .iter()
            .map(|r| match r.outcome {
                SymbolOutcome::Written { rows } => rows,
                _ => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> usize {
        self.count(|o| matches!(o, SymbolOutcome::Failed { .. }))
    }

    pub fn empties(&self) -> usize {
        self.count(|o| matches!(o, SymbolOutcome::Empty { .. }))
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }

    pub fn outcome_for(&self, symbol: &str) -> Option<&SymbolOutcome> {
        self.symbols
            .iter()
            .find(|r| r.symbol == symbol)
            .map(|r| &r.outcome)
    }

    fn count(&self, pred: impl Fn(&SymbolOutcome) -> bool) -> usize {
        self.symbols.iter().filter(|r| pred(&r.outcome)).count()
    }
}
