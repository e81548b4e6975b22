//! Service runtime: HTTP surface and the ingestion worker pool

pub mod http;
pub mod runtime;

pub use http::*;
pub use runtime::*;
