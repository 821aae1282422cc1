//! HTTP client for a `latest/{BASE}` style exchange-rate API.
//!
//! Responses look like `{"base": "USD", "rates": {"EUR": 0.92, ...}}`. Each
//! base currency's table is cached for the configured TTL.

use async_trait::async_trait;
use moka::future::Cache;
use outlay_shared::CurrencySettings;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::conversion::normalize_code;
use super::converter::CurrencyConverter;
use super::error::ConversionError;

/// Number of base currencies kept in the cache.
const RATE_TABLE_CAPACITY: u64 = 200;

type RateTable = Arc<HashMap<String, Decimal>>;

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    rates: HashMap<String, serde_json::Number>,
}

/// Exchange-rate API client with a per-base-currency cache.
#[derive(Clone)]
pub struct ExchangeRateApiConverter {
    client: Client,
    base_url: String,
    tables: Cache<String, RateTable>,
}

impl ExchangeRateApiConverter {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConversionError::Unavailable` if the HTTP client cannot be
    /// built.
    pub fn new(settings: &CurrencySettings) -> Result<Self, ConversionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| ConversionError::Unavailable(e.to_string()))?;

        let tables = Cache::builder()
            .max_capacity(RATE_TABLE_CAPACITY)
            .time_to_live(Duration::from_secs(settings.cache_ttl_secs))
            .build();

        Ok(Self {
            client,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            tables,
        })
    }

    async fn table(&self, base: &str) -> Result<RateTable, ConversionError> {
        self.tables
            .try_get_with(base.to_string(), self.fetch_table(base))
            .await
            .map_err(|e: Arc<ConversionError>| (*e).clone())
    }

    async fn fetch_table(&self, base: &str) -> Result<RateTable, ConversionError> {
        let url = format!("{}/latest/{base}", self.base_url);
        debug!(%url, "Fetching exchange rates");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ConversionError::Unavailable(e.to_string()))?;

        let body: LatestRatesResponse = response
            .json()
            .await
            .map_err(|e| ConversionError::InvalidResponse(e.to_string()))?;

        parse_rates(body.rates).map(Arc::new)
    }
}

/// Parses JSON numbers into decimals without going through floats.
fn parse_rates(
    raw: HashMap<String, serde_json::Number>,
) -> Result<HashMap<String, Decimal>, ConversionError> {
    raw.into_iter()
        .map(|(code, number)| {
            let text = number.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map(|rate| (normalize_code(&code), rate))
                .map_err(|e| ConversionError::InvalidResponse(format!("rate for {code}: {e}")))
        })
        .collect()
}

#[async_trait]
impl CurrencyConverter for ExchangeRateApiConverter {
    async fn rate(&self, from: &str, to: &str) -> Result<Decimal, ConversionError> {
        let from = normalize_code(from);
        let to = normalize_code(to);
        let table = self.table(&from).await?;

        table
            .get(&to)
            .copied()
            .ok_or(ConversionError::RateNotFound { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_rates_keeps_precision() {
        let body: LatestRatesResponse =
            serde_json::from_str(r#"{"base":"USD","rates":{"eur":0.9213,"JPY":149.5,"USD":1}}"#)
                .unwrap();

        let rates = parse_rates(body.rates).unwrap();

        assert_eq!(rates["EUR"], dec!(0.9213));
        assert_eq!(rates["JPY"], dec!(149.5));
        assert_eq!(rates["USD"], dec!(1));
    }

    #[test]
    fn test_parse_rates_accepts_exponent_notation() {
        let body: LatestRatesResponse =
            serde_json::from_str(r#"{"rates":{"BTC":1.5e-5}}"#).unwrap();

        let rates = parse_rates(body.rates).unwrap();

        assert_eq!(rates["BTC"], dec!(0.000015));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        let converter = ExchangeRateApiConverter::new(&CurrencySettings {
            api_base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            cache_ttl_secs: 60,
        })
        .unwrap();

        let result = converter.rate("USD", "EUR").await;

        assert!(matches!(result, Err(ConversionError::Unavailable(_))));
    }
}
