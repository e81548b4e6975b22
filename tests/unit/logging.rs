//! Unit tests for log format selection

use price_ingestor::logging::{init_logging, log_format, LogFormat};

#[test]
fn production_logs_as_json() {
    assert_eq!(log_format("production"), LogFormat::Json);
    assert_eq!(log_format("PROD"), LogFormat::Json);
}

#[test]
fn everything_else_logs_pretty() {
    assert_eq!(log_format("sandbox"), LogFormat::Pretty);
    assert_eq!(log_format("staging"), LogFormat::Pretty);
    assert_eq!(log_format(""), LogFormat::Pretty);
}

#[test]
fn repeated_initialization_is_harmless() {
    init_logging();
    init_logging();
}
