//! Amount conversion arithmetic.
//!
//! Converted amounts are rounded to cents with banker's rounding (round half
//! to even); the original amount is always stored next to the converted one.

use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;

/// Decimal places of stored converted amounts.
pub const AMOUNT_DECIMAL_PLACES: u32 = 2;

/// Fractional digits an amount column holds (`NUMERIC(19, 4)`).
pub const AMOUNT_MAX_SCALE: u32 = 4;

/// Integer digits an amount column holds (`NUMERIC(19, 4)`).
pub const AMOUNT_MAX_INTEGER_DIGITS: u32 = 15;

/// Returns true if the amount fits an amount column.
#[must_use]
pub fn fits_amount_column(amount: Decimal) -> bool {
    let limit = Decimal::from(10_u64.pow(AMOUNT_MAX_INTEGER_DIGITS));
    amount.abs() < limit && amount.normalize().scale() <= AMOUNT_MAX_SCALE
}

/// Converts an amount using the given exchange rate.
///
/// Uses banker's rounding (round half to even) to minimize cumulative errors.
/// Returns `None` if the product overflows or does not fit an amount column.
#[must_use]
pub fn convert_amount(amount: Decimal, rate: Decimal) -> Option<Decimal> {
    let converted = amount
        .checked_mul(rate)?
        .round_dp_with_strategy(AMOUNT_DECIMAL_PLACES, RoundingStrategy::MidpointNearestEven);
    fits_amount_column(converted).then_some(converted)
}

/// Normalizes a currency code for comparison and lookup.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
