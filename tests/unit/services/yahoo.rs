//! Unit tests for chart payload conversion

use chrono::Timelike;
use price_ingestor::normalize::normalize;
use price_ingestor::services::market_data::{FetchError, RawValue};
use price_ingestor::services::yahoo::chart_to_table;
use price_ingestor::services::yahoo::messages::ChartResponse;
use serde_json::json;

use crate::test_utils::date;

// 2024-01-02 and 2024-01-03, 09:00 Taipei.
const DAY_ONE: i64 = 1_704_157_200;
const DAY_TWO: i64 = 1_704_243_600;

fn chart(body: serde_json::Value) -> ChartResponse {
    serde_json::from_value(body).unwrap()
}

fn taipei_chart(timestamps: Vec<i64>, quote: serde_json::Value) -> ChartResponse {
    chart(json!({
        "chart": {
            "result": [{
                "meta": {
                    "symbol": "2330.TW",
                    "gmtoffset": 28800,
                    "exchangeTimezoneName": "Asia/Taipei"
                },
                "timestamp": timestamps,
                "indicators": { "quote": [quote] }
            }],
            "error": null
        }
    }))
}

#[test]
fn builds_one_row_per_timestamp_in_exchange_time() {
    let table = chart_to_table(taipei_chart(
        vec![DAY_ONE, DAY_TWO],
        json!({
            "open": [100.125, 101.0],
            "high": [101.0, 102.5],
            "low": [99.5, 100.0],
            "close": [100.8, 102.0],
            "volume": [1000000, 2500000]
        }),
    ))
    .unwrap();

    assert_eq!(table.columns, vec!["Date", "Open", "High", "Low", "Close", "Volume"]);
    assert_eq!(table.len(), 2);
    match &table.rows[0][0] {
        RawValue::Timestamp(ts) => {
            assert_eq!(ts.date_naive(), date(2024, 1, 2));
            assert_eq!(ts.hour(), 9);
        }
        other => panic!("expected timestamp, got {:?}", other),
    }
    assert_eq!(table.rows[1][5], RawValue::Number(2_500_000.0));
}

#[test]
fn converted_table_normalizes() {
    let table = chart_to_table(taipei_chart(
        vec![DAY_ONE],
        json!({
            "open": [100.125],
            "high": [101.0],
            "low": [99.5],
            "close": [100.8],
            "volume": [1000000]
        }),
    ))
    .unwrap();

    let bars = normalize("2330.TW", &table).unwrap();
    assert_eq!(bars[0].symbol, "2330");
    assert_eq!(bars[0].date, date(2024, 1, 2));
    assert_eq!(bars[0].open.to_string(), "100.13");
}

#[test]
fn drops_rows_without_any_price() {
    let table = chart_to_table(taipei_chart(
        vec![DAY_ONE, DAY_TWO],
        json!({
            "open": [null, 101.0],
            "high": [null, 102.5],
            "low": [null, 100.0],
            "close": [null, 102.0],
            "volume": [null, 2500000]
        }),
    ))
    .unwrap();

    assert_eq!(table.len(), 1);
}

#[test]
fn partial_nulls_survive_for_normalization_to_judge() {
    let table = chart_to_table(taipei_chart(
        vec![DAY_ONE],
        json!({
            "open": [100.0],
            "high": [null],
            "low": [99.0],
            "close": [100.0],
            "volume": [10]
        }),
    ))
    .unwrap();

    assert_eq!(table.rows[0][2], RawValue::Null);
    assert!(normalize("2330.TW", &table).is_err());
}

#[test]
fn only_placeholder_rows_is_no_data() {
    let result = chart_to_table(taipei_chart(
        vec![DAY_ONE],
        json!({ "open": [null], "high": [null], "low": [null], "close": [null], "volume": [null] }),
    ));
    assert!(matches!(result, Err(FetchError::NoData)));
}

#[test]
fn missing_timestamps_is_no_data() {
    let result = chart_to_table(chart(json!({
        "chart": {
            "result": [{
                "meta": { "symbol": "2330.TW", "gmtoffset": 28800 },
                "indicators": { "quote": [{}] }
            }],
            "error": null
        }
    })));
    assert!(matches!(result, Err(FetchError::NoData)));

    let result = chart_to_table(chart(json!({ "chart": { "result": null, "error": null } })));
    assert!(matches!(result, Err(FetchError::NoData)));
}

#[test]
fn chart_error_becomes_provider_error() {
    let result = chart_to_table(chart(json!({
        "chart": {
            "result": null,
            "error": {
                "code": "Not Found",
                "description": "No data found, symbol may be delisted"
            }
        }
    })));

    match result {
        Err(FetchError::Provider { code, description }) => {
            assert_eq!(code, "Not Found");
            assert!(description.contains("delisted"));
        }
        other => panic!("expected provider error, got {:?}", other),
    }
}
