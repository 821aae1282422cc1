//! Currency conversion errors.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors from exchange-rate lookups. Callers recover from all of them by
/// keeping the unconverted amount.
#[derive(Debug, Clone, Error)]
pub enum ConversionError {
    /// The rate service could not be reached or answered with an error.
    #[error("Exchange rate service unavailable: {0}")]
    Unavailable(String),

    /// The rate service answered with something unreadable.
    #[error("Invalid exchange rate response: {0}")]
    InvalidResponse(String),

    /// No rate is published for the pair.
    #[error("No exchange rate from {from} to {to}")]
    RateNotFound {
        /// Source currency code.
        from: String,
        /// Target currency code.
        to: String,
    },

    /// The converted amount overflows or does not fit an amount column.
    #[error("Converting {amount} at rate {rate} is out of range")]
    OutOfRange {
        /// Amount being converted.
        amount: Decimal,
        /// Rate applied.
        rate: Decimal,
    },
}
