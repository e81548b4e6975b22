//! Unit tests for the in-memory sink and write policies

use price_ingestor::db::{validate_table_name, MemoryPriceSink, PersistError, PriceSink, WritePolicy};
use price_ingestor::models::PriceBar;
use rust_decimal::Decimal;
use tokio_test::{assert_err, assert_ok};

use crate::test_utils::{date, TABLE};

fn bar(symbol: &str, day: u32) -> PriceBar {
    let price = Decimal::new(10_050, 2);
    PriceBar::new(symbol, date(2024, 1, day), price, price, price, price, 1_000)
}

#[tokio::test]
async fn append_writes_every_row_including_repeats() {
    let sink = MemoryPriceSink::new();
    let bars = vec![bar("2330", 2), bar("2330", 3)];

    assert_eq!(sink.persist(TABLE, &bars).await.unwrap(), 2);
    assert_eq!(sink.persist(TABLE, &bars).await.unwrap(), 2);

    assert_eq!(sink.row_count(TABLE).await, 4);
}

#[tokio::test]
async fn skip_existing_ignores_known_symbol_dates() {
    let sink = MemoryPriceSink::with_policy(WritePolicy::SkipExisting);

    assert_eq!(sink.persist(TABLE, &[bar("2330", 2), bar("2330", 3)]).await.unwrap(), 2);
    assert_eq!(sink.persist(TABLE, &[bar("2330", 3), bar("2330", 4)]).await.unwrap(), 1);
    // Same date, different symbol is a distinct row.
    assert_eq!(sink.persist(TABLE, &[bar("2317", 3)]).await.unwrap(), 1);

    assert_eq!(sink.row_count(TABLE).await, 4);
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
    let sink = MemoryPriceSink::new();
    assert_eq!(sink.persist(TABLE, &[]).await.unwrap(), 0);
    assert_eq!(sink.row_count(TABLE).await, 0);
}

#[tokio::test]
async fn rows_keep_write_order() {
    let sink = MemoryPriceSink::new();
    sink.persist(TABLE, &[bar("2330", 5), bar("2330", 2)]).await.unwrap();

    let rows = sink.rows(TABLE).await;
    assert_eq!(rows[0].date, date(2024, 1, 5));
    assert_eq!(rows[1].date, date(2024, 1, 2));
}

#[tokio::test]
async fn invalid_table_is_refused() {
    let sink = MemoryPriceSink::new();
    let result = sink.persist("prices; DROP TABLE x", &[bar("2330", 2)]).await;
    assert!(matches!(result, Err(PersistError::InvalidTable(_))));
}

#[tokio::test]
async fn empty_batch_skips_table_validation() {
    let sink = MemoryPriceSink::new();
    assert_eq!(assert_ok!(sink.persist("prices; DROP TABLE x", &[]).await), 0);
    assert_err!(sink.persist("prices; DROP TABLE x", &[bar("2330", 2)]).await);
}

#[test]
fn table_names_follow_identifier_rules() {
    assert_ok!(validate_table_name("daily_prices"));
    assert_ok!(validate_table_name("market.daily_prices"));
    assert_ok!(validate_table_name("_staging2"));

    assert_err!(validate_table_name(""));
    assert_err!(validate_table_name("2prices"));
    assert_err!(validate_table_name("a.b.c"));
    assert_err!(validate_table_name("daily-prices"));
    assert_err!(validate_table_name(&"p".repeat(64)));
}

#[test]
fn write_policy_parses_and_displays() {
    assert_eq!("append".parse::<WritePolicy>().unwrap(), WritePolicy::Append);
    assert_eq!("Skip-Existing".parse::<WritePolicy>().unwrap(), WritePolicy::SkipExisting);
    assert_eq!("skip_existing".parse::<WritePolicy>().unwrap(), WritePolicy::SkipExisting);
    assert!("upsert".parse::<WritePolicy>().is_err());
    assert_eq!(WritePolicy::default(), WritePolicy::Append);
    assert_eq!(WritePolicy::SkipExisting.to_string(), "skip-existing");
}
