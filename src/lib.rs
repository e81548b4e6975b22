//! Daily equity price ingestion service
//!
//! Fetches daily bars from a market-data provider, normalizes them and appends
//! them to a PostgreSQL price table. Runs are triggered over HTTP and executed
//! by a background worker pool.

pub mod config;
pub mod core;
pub mod db;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod services;
