//! The exchange-rate boundary and the fallback policy around it.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::warn;

use super::conversion::{convert_amount, normalize_code};
use super::error::ConversionError;

/// Source of exchange rates.
#[async_trait]
pub trait CurrencyConverter: Send + Sync {
    /// Rate such that `1 from = rate to`.
    async fn rate(&self, from: &str, to: &str) -> Result<Decimal, ConversionError>;

    /// Converts `amount` from one currency to another.
    async fn convert(&self, amount: Decimal, from: &str, to: &str) -> Result<Decimal, ConversionError> {
        if normalize_code(from) == normalize_code(to) {
            return Ok(amount);
        }
        let rate = self.rate(from, to).await?;
        convert_amount(amount, rate).ok_or(ConversionError::OutOfRange { amount, rate })
    }
}

/// Converts `amount`, falling back to the unconverted amount on failure.
pub async fn convert_or_original(
    converter: &dyn CurrencyConverter,
    amount: Decimal,
    from: &str,
    to: &str,
) -> Decimal {
    match converter.convert(amount, from, to).await {
        Ok(converted) => converted,
        Err(e) => {
            warn!(from, to, %amount, error = %e, "Currency conversion failed, keeping original amount");
            amount
        }
    }
}

/// Converter over a fixed rate table, keyed by `(FROM, TO)`.
#[derive(Debug, Clone, Default)]
pub struct FixedRateConverter {
    rates: HashMap<(String, String), Decimal>,
}

impl FixedRateConverter {
    /// Creates an empty table; every lookup fails.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rate.
    #[must_use]
    pub fn with_rate(mut self, from: &str, to: &str, rate: Decimal) -> Self {
        self.rates
            .insert((normalize_code(from), normalize_code(to)), rate);
        self
    }
}

#[async_trait]
impl CurrencyConverter for FixedRateConverter {
    async fn rate(&self, from: &str, to: &str) -> Result<Decimal, ConversionError> {
        self.rates
            .get(&(normalize_code(from), normalize_code(to)))
            .copied()
            .ok_or_else(|| ConversionError::RateNotFound {
                from: from.to_string(),
                to: to.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_same_currency_skips_lookup() {
        let converter = FixedRateConverter::new();
        let amount = converter.convert(dec!(12.345), "usd", "USD").await.unwrap();
        assert_eq!(amount, dec!(12.345));
    }

    #[tokio::test]
    async fn test_convert_with_table() {
        let converter = FixedRateConverter::new().with_rate("EUR", "USD", dec!(1.0850));
        let amount = converter.convert(dec!(20), "eur", "usd").await.unwrap();
        assert_eq!(amount, dec!(21.70));
    }

    #[tokio::test]
    async fn test_missing_rate_falls_back_to_original() {
        let converter = FixedRateConverter::new();
        let amount = convert_or_original(&converter, dec!(50), "JPY", "USD").await;
        assert_eq!(amount, dec!(50));
    }

    #[tokio::test]
    async fn test_overflow_is_a_conversion_error() {
        let converter = FixedRateConverter::new().with_rate("EUR", "USD", dec!(1.10));
        let result = converter.convert(Decimal::MAX, "EUR", "USD").await;
        assert!(matches!(result, Err(ConversionError::OutOfRange { .. })));
    }

    #[tokio::test]
    async fn test_overflow_falls_back_to_original() {
        let converter = FixedRateConverter::new().with_rate("EUR", "USD", dec!(1.10));
        let amount = convert_or_original(&converter, Decimal::MAX, "EUR", "USD").await;
        assert_eq!(amount, Decimal::MAX);
    }
}
