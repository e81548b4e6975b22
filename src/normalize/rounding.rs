use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Fractional digits kept for stored prices.
pub const PRICE_SCALE: u32 = 2;

/// Round a provider price to two decimals, half away from zero.
///
/// The float is first read at its shortest decimal form (`100.135` stays
/// `100.135`, not `100.13499..`), so halves round up the way they read.
/// Returns `None` for NaN, infinities and magnitudes a `Decimal` cannot hold.
pub fn round_price(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero))
}

/// Truncate a provider volume toward zero.
///
/// Returns `None` for negative or non-finite input and for values that do not
/// fit the signed 64-bit volume column.
pub fn truncate_volume(value: f64) -> Option<u64> {
    let truncated = value.trunc();
    if !truncated.is_finite() || truncated < 0.0 || truncated >= i64::MAX as f64 {
        return None;
    }
    Some(truncated as u64)
}
