//! Unit tests for PostgreSQL statement construction

use price_ingestor::db::postgres::{
    create_table_statement, create_unique_index_statement, insert_statement, COLUMNS,
};
use price_ingestor::db::WritePolicy;

#[test]
fn insert_numbers_placeholders_per_row() {
    let sql = insert_statement("daily_prices", 2, WritePolicy::Append);
    assert_eq!(
        sql,
        "INSERT INTO daily_prices (date, symbol, open, high, low, close, volume) VALUES \
         ($1, $2, $3, $4, $5, $6, $7), ($8, $9, $10, $11, $12, $13, $14)"
    );
}

#[test]
fn append_never_adds_conflict_clause() {
    let sql = insert_statement("daily_prices", 1, WritePolicy::Append);
    assert!(!sql.contains("ON CONFLICT"));
}

#[test]
fn skip_existing_adds_conflict_clause() {
    let sql = insert_statement("market.daily_prices", 1, WritePolicy::SkipExisting);
    assert!(sql.starts_with("INSERT INTO market.daily_prices "));
    assert!(sql.ends_with(" ON CONFLICT (symbol, date) DO NOTHING"));
}

#[test]
fn last_placeholder_matches_bind_count() {
    let rows = 1000;
    let sql = insert_statement("daily_prices", rows, WritePolicy::Append);
    let last = format!("${})", rows * COLUMNS.len());
    assert!(sql.ends_with(&last));
}

#[test]
fn schema_statements_name_the_table() {
    let create = create_table_statement("daily_prices");
    assert!(create.starts_with("CREATE TABLE IF NOT EXISTS daily_prices"));
    for column in COLUMNS {
        assert!(create.contains(column));
    }

    let index = create_unique_index_statement("market.daily_prices");
    assert_eq!(
        index,
        "CREATE UNIQUE INDEX IF NOT EXISTS daily_prices_symbol_date_key ON market.daily_prices (symbol, date)"
    );
}

#[tokio::test]
async fn empty_batch_never_touches_the_database() {
    use price_ingestor::db::{PostgresPriceSink, PriceSink};

    // Nothing listens on port 1; any round-trip would fail.
    let sink = PostgresPriceSink::connect("postgres://ingest@127.0.0.1:1/prices", 1, WritePolicy::Append)
        .expect("pool configuration");

    assert_eq!(sink.persist("daily_prices", &[]).await.unwrap(), 0);
    assert_eq!(sink.persist("not a table", &[]).await.unwrap(), 0);
}
