//! External service integrations (market data providers)

pub mod market_data;
pub mod yahoo;

pub use market_data::{FetchError, MarketDataProvider, RawTable, RawValue};
