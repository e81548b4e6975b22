//! Unit tests for ingestion request and summary models

use chrono::Utc;
use price_ingestor::models::{
    IngestionRequest, LookbackPeriod, RunSummary, Stage, SymbolOutcome, SymbolReport,
};

use crate::test_utils::date;

#[test]
fn period_parses_known_codes_case_insensitively() {
    assert_eq!("1d".parse::<LookbackPeriod>().unwrap(), LookbackPeriod::OneDay);
    assert_eq!("5D".parse::<LookbackPeriod>().unwrap(), LookbackPeriod::FiveDays);
    assert_eq!(" 1mo ".parse::<LookbackPeriod>().unwrap(), LookbackPeriod::OneMonth);
    assert_eq!("3mo".parse::<LookbackPeriod>().unwrap(), LookbackPeriod::ThreeMonths);
    assert_eq!("6mo".parse::<LookbackPeriod>().unwrap(), LookbackPeriod::SixMonths);
    assert_eq!("1Y".parse::<LookbackPeriod>().unwrap(), LookbackPeriod::OneYear);
}

#[test]
fn period_rejects_unknown_codes() {
    let err = "2w".parse::<LookbackPeriod>().unwrap_err();
    assert!(err.to_string().contains("2w"));
    assert!("".parse::<LookbackPeriod>().is_err());
}

#[test]
fn period_defaults_to_one_month_and_displays_its_code() {
    assert_eq!(LookbackPeriod::default(), LookbackPeriod::OneMonth);
    assert_eq!(LookbackPeriod::OneMonth.to_string(), "1mo");
    assert_eq!(
        serde_json::to_string(&LookbackPeriod::FiveDays).unwrap(),
        "\"5d\""
    );
}

#[test]
fn month_window_has_one_day_slack_each_side() {
    let (start, end) = LookbackPeriod::OneMonth.window(date(2024, 3, 15));
    assert_eq!(start, date(2024, 2, 14));
    assert_eq!(end, date(2024, 3, 16));
}

#[test]
fn short_windows_cover_weekends() {
    // Monday: the last session may be the previous Friday or earlier.
    let monday = date(2024, 1, 8);
    let (start, _) = LookbackPeriod::OneDay.window(monday);
    assert!(start <= date(2024, 1, 5));

    let (start, _) = LookbackPeriod::FiveDays.window(monday);
    assert!(start <= date(2023, 12, 29));
}

#[test]
fn request_period_defaults_when_omitted() {
    let request: IngestionRequest = serde_json::from_str(r#"{"symbols":["2330.TW"]}"#).unwrap();
    assert_eq!(request.period, LookbackPeriod::OneMonth);
    assert_eq!(request.symbols, vec!["2330.TW".to_string()]);
}

fn summary(outcomes: Vec<(&str, SymbolOutcome)>) -> RunSummary {
    RunSummary {
        run_id: 7,
        period: LookbackPeriod::OneMonth,
        started_at: Utc::now(),
        finished_at: Utc::now(),
        skipped: None,
        symbols: outcomes
            .into_iter()
            .map(|(symbol, outcome)| SymbolReport {
                symbol: symbol.to_string(),
                outcome,
            })
            .collect(),
    }
}

#[test]
fn summary_counts_outcomes() {
    let run = summary(vec![
        ("2330.TW", SymbolOutcome::Written { rows: 20 }),
        ("2317.TW", SymbolOutcome::Written { rows: 21 }),
        (
            "BAD.TW",
            SymbolOutcome::Failed {
                stage: Stage::Fetch,
                message: "Not Found".to_string(),
            },
        ),
        (
            "HALT.TW",
            SymbolOutcome::Empty {
                reason: "provider returned no data".to_string(),
            },
        ),
    ]);

    assert_eq!(run.rows_written(), 41);
    assert_eq!(run.failures(), 1);
    assert_eq!(run.empties(), 1);
    assert!(!run.is_skipped());
    assert_eq!(
        run.outcome_for("2317.TW"),
        Some(&SymbolOutcome::Written { rows: 21 })
    );
    assert_eq!(run.outcome_for("MISSING"), None);
}

#[test]
fn symbol_report_serializes_flat() {
    let report = SymbolReport {
        symbol: "BAD.TW".to_string(),
        outcome: SymbolOutcome::Failed {
            stage: Stage::Validate,
            message: "stale".to_string(),
        },
    };
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["symbol"], "BAD.TW");
    assert_eq!(value["outcome"], "failed");
    assert_eq!(value["stage"], "validate");
    assert_eq!(value["message"], "stale");
}

#[test]
fn unskipped_summary_omits_skipped_field() {
    let value = serde_json::to_value(summary(vec![])).unwrap();
    assert!(value.get("skipped").is_none());
    assert_eq!(value["period"], "1mo");
}
