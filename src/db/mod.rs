//! Price table persistence

pub mod postgres;
pub mod sink;

pub use postgres::PostgresPriceSink;
pub use sink::{validate_table_name, MemoryPriceSink, PersistError, PriceSink, WritePolicy};
