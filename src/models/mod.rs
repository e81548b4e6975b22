//! Shared data models spanning the ingestion layers.

pub mod ingestion;
pub mod price_bar;

pub use ingestion::{
    IngestionRequest, LookbackPeriod, ParsePeriodError, RunSummary, Stage, SymbolOutcome,
    SymbolReport,
};
pub use price_bar::PriceBar;
