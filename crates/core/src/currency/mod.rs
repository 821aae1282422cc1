//! Currency conversion into a company's reporting currency.

pub mod client;
pub mod conversion;
pub mod converter;
pub mod error;

pub use client::ExchangeRateApiConverter;
pub use conversion::{AMOUNT_DECIMAL_PLACES, convert_amount, fits_amount_column};
pub use converter::{CurrencyConverter, FixedRateConverter, convert_or_original};
pub use error::ConversionError;
