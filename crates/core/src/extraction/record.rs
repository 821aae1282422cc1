//! Expense records returned by the extraction model.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;

use super::error::ExtractionError;
use crate::expense::types::NewExpense;

/// Default merchant name.
pub const DEFAULT_MERCHANT: &str = "Unknown Merchant";
/// Default currency.
pub const DEFAULT_CURRENCY: &str = "USD";
/// Default category.
pub const DEFAULT_CATEGORY: &str = "General";
/// Default description.
pub const DEFAULT_DESCRIPTION: &str = "AI extracted expense";

/// One expense line found in a document. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedExpense {
    /// Merchant or vendor.
    pub merchant_name: Option<String>,
    /// Amount; numbers and numeric strings are both accepted.
    #[serde(deserialize_with = "lenient_amount")]
    pub amount: Option<Decimal>,
    /// ISO 4217 code.
    pub currency: Option<String>,
    /// `YYYY-MM-DD`, optionally followed by a time.
    #[serde(deserialize_with = "lenient_date")]
    pub date: Option<NaiveDate>,
    /// Category.
    pub category: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Free-form type (Meal, Flight, ...).
    pub expense_type: Option<String>,
}

impl ExtractedExpense {
    /// Fills missing fields with defaults and builds a submission input.
    #[must_use]
    pub fn into_new_expense(self, today: NaiveDate) -> NewExpense {
        NewExpense {
            amount: self.amount.unwrap_or(Decimal::ZERO),
            currency: or_default(self.currency, DEFAULT_CURRENCY),
            category: or_default(self.category, DEFAULT_CATEGORY),
            description: or_default(self.description, DEFAULT_DESCRIPTION),
            expense_date: Some(self.date.unwrap_or(today)),
            merchant_name: Some(or_default(self.merchant_name, DEFAULT_MERCHANT)),
            expense_type: non_blank(self.expense_type),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn or_default(value: Option<String>, default: &str) -> String {
    non_blank(value).unwrap_or_else(|| default.to_string())
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => parse_decimal(&n.to_string()),
        Some(Value::String(s)) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            parse_decimal(&cleaned)
        }
        _ => None,
    })
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s
            .trim()
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
        _ => None,
    })
}

/// Parses the model's text answer into expense records.
///
/// Markdown code fences are stripped. Both a JSON array and a single JSON
/// object are accepted.
///
/// # Errors
///
/// Returns `ExtractionError::InvalidResponse` if the text is not JSON of
/// either shape.
pub fn parse_extraction_payload(text: &str) -> Result<Vec<ExtractedExpense>, ExtractionError> {
    let cleaned = strip_code_fence(text);

    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| ExtractionError::InvalidResponse(e.to_string()))?;

    let records = match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        other => {
            return Err(ExtractionError::InvalidResponse(format!(
                "expected an array or object, got {other}"
            )));
        }
    };

    records
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).map_err(|e| ExtractionError::InvalidResponse(e.to_string()))
        })
        .collect()
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) up to the end of the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_parse_fenced_array() {
        let text = "```json\n[{\"merchantName\":\"Cafe Roma\",\"amount\":25.50,\"currency\":\"EUR\",\"date\":\"2024-10-04\",\"category\":\"Food\",\"description\":\"Lunch\",\"expenseType\":\"Meal\"},{\"amount\":\"$12.00\"}]\n```";

        let records = parse_extraction_payload(text).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].merchant_name.as_deref(), Some("Cafe Roma"));
        assert_eq!(records[0].amount, Some(dec!(25.50)));
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 10, 4));
        assert_eq!(records[0].expense_type.as_deref(), Some("Meal"));
        assert_eq!(records[1].amount, Some(dec!(12.00)));
    }

    #[test]
    fn test_parse_single_object_without_fence() {
        let records = parse_extraction_payload(r#"{"merchantName":"Uber","amount":18}"#).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].amount, Some(dec!(18)));
    }

    #[test]
    fn test_parse_plain_fence() {
        let records = parse_extraction_payload("```\n[]\n```").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_rejects_prose() {
        let result = parse_extraction_payload("I could not read this receipt.");
        assert!(matches!(result, Err(ExtractionError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_rejects_scalar() {
        assert!(parse_extraction_payload("42").is_err());
    }

    #[test]
    fn test_unreadable_fields_become_missing() {
        let records =
            parse_extraction_payload(r#"[{"amount":"n/a","date":"yesterday","currency":null}]"#)
                .unwrap();
        assert_eq!(records[0], ExtractedExpense::default());
    }

    #[test]
    fn test_defaults_applied() {
        let input = ExtractedExpense::default().into_new_expense(today());

        assert_eq!(input.amount, Decimal::ZERO);
        assert_eq!(input.currency, "USD");
        assert_eq!(input.category, "General");
        assert_eq!(input.description, "AI extracted expense");
        assert_eq!(input.merchant_name.as_deref(), Some("Unknown Merchant"));
        assert_eq!(input.expense_date, Some(today()));
        assert_eq!(input.expense_type, None);
    }

    #[test]
    fn test_blank_strings_get_defaults() {
        let record = ExtractedExpense {
            category: Some("  ".to_string()),
            merchant_name: Some(String::new()),
            ..ExtractedExpense::default()
        };
        let input = record.into_new_expense(today());
        assert_eq!(input.category, "General");
        assert_eq!(input.merchant_name.as_deref(), Some("Unknown Merchant"));
    }

    #[test]
    fn test_datetime_string_truncated_to_date() {
        let records = parse_extraction_payload(r#"{"date":"2025-01-31T10:00:00Z"}"#).unwrap();
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2025, 1, 31));
    }
}
