//! Fixed-point money handling for donation amounts.
//!
//! Amounts carry two decimal places and at most ten significant digits. They
//! are persisted as integer minor units (cents) so aggregate sums stay exact.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serializer;
use thiserror::Error;

/// Total digits allowed for a single donation amount.
pub const MAX_DIGITS: u32 = 10;
/// Digits kept after the decimal point.
pub const DECIMAL_PLACES: u32 = 2;

/// Errors raised when an amount does not fit the storage precision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount {0} has more than 2 decimal places")]
    TooManyDecimalPlaces(Decimal),
    #[error("amount {0} has more than 10 digits in total")]
    TooManyDigits(Decimal),
}

/// Converts an amount into cents, rejecting values the column cannot hold.
pub fn to_minor_units(amount: Decimal) -> Result<i64, AmountError> {
    if amount.round_dp(DECIMAL_PLACES) != amount {
        return Err(AmountError::TooManyDecimalPlaces(amount));
    }

    let integer_limit = Decimal::from(10_i64.pow(MAX_DIGITS - DECIMAL_PLACES));
    if amount.trunc().abs() >= integer_limit {
        return Err(AmountError::TooManyDigits(amount));
    }

    (amount * Decimal::from(100))
        .trunc()
        .to_i64()
        .ok_or(AmountError::TooManyDigits(amount))
}

/// Rebuilds a two-place decimal from cents.
pub fn from_minor_units(cents: i64) -> Decimal {
    Decimal::new(cents, DECIMAL_PLACES)
}

/// Formats with exactly two decimal places, e.g. `26500.00`.
pub fn format_fixed(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

/// Serde adapter emitting decimals as fixed two-place strings.
pub fn serialize<S>(amount: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_fixed(*amount))
}
