//! Yahoo Finance chart API provider

pub mod client;
pub mod messages;

pub use client::{chart_to_table, YahooChartClient, DEFAULT_BASE_URL};
