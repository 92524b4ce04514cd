/// Utility helpers shared by the collector pipeline.
///
/// This module contains:
/// - Token amount scaling
/// - Time helpers
///
/// IMPORTANT:
/// - No backend-specific logic should live here.
/// - Everything here must stay pure and deterministic (apart from the clock).
///
use rust_decimal::Decimal;

/// Number of decimals of the monitored token.
pub const TOKEN_DECIMALS: u32 = 18;

const TOKEN_UNIT: u128 = 10u128.pow(TOKEN_DECIMALS);

/// Convert a raw integer token amount into whole tokens.
///
/// Examples:
/// - 2_500_000_000_000_000_000 -> 2.5
/// - 1                         -> 1e-18
///
/// DESIGN NOTES:
/// - The quotient is built exactly as a decimal and rounded to f64 once,
///   by parsing its decimal digits; the result is the nearest f64.
/// - Amounts beyond the decimal mantissa (~7.9e28 raw units) build the
///   same digits from an integer whole / fractional split.
///
pub fn scale_balance(raw: u128) -> f64 {
    let digits = i128::try_from(raw)
        .ok()
        .and_then(|v| Decimal::try_from_i128_with_scale(v, TOKEN_DECIMALS).ok())
        .map(|d| d.to_string())
        .unwrap_or_else(|| format!("{}.{:018}", raw / TOKEN_UNIT, raw % TOKEN_UNIT));

    digits.parse().unwrap_or(f64::NAN)
}

/// Returns the current Unix timestamp in nanoseconds.
///
/// Used as the point timestamp for sink writes. Falls back to 0 for dates
/// outside the i64 nanosecond range (years beyond 2262).
pub fn now_ns() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
}
