//! Gemini `generateContent` client for receipt extraction.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use outlay_shared::ExtractionSettings;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};

use super::document::Document;
use super::error::ExtractionError;
use super::record::{ExtractedExpense, parse_extraction_payload};
use super::DocumentExtractor;

const PROMPT: &str = r#"Extract every expense line item from this document. Receipts with several items, trips with flights and hotels, and spreadsheets with several rows each produce one record per item.

For each item return an object with these keys:
- "merchantName": merchant or vendor
- "amount": number only, no currency symbol
- "currency": ISO 4217 code such as USD, EUR or INR
- "date": YYYY-MM-DD
- "category": one of Food, Travel, Accommodation, Transport, Office Supplies, Entertainment, Training, General
- "description": short description of the item
- "expenseType": short type such as Meal, Flight, Hotel or Taxi

Leave out any key you cannot determine. Answer with a JSON array only."#;

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

/// Extractor backed by the Gemini API.
#[derive(Clone)]
pub struct GeminiExtractor {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl std::fmt::Debug for GeminiExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiExtractor")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"[hidden]")
            .finish()
    }
}

impl GeminiExtractor {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ExtractionError::NotConfigured` without an API key, and
    /// `ExtractionError::Upstream` if the HTTP client cannot be built.
    pub fn new(settings: &ExtractionSettings) -> Result<Self, ExtractionError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ExtractionError::NotConfigured)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| ExtractionError::Upstream(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key,
        })
    }

    fn request_body(document: &Document) -> Value {
        json!({
            "contents": [{
                "parts": [
                    {
                        "inline_data": {
                            "mime_type": document.mime_type(),
                            "data": STANDARD.encode(document.bytes()),
                        }
                    },
                    { "text": format!("The attached file is a {}.\n\n{PROMPT}", document.kind()) }
                ]
            }]
        })
    }
}

#[async_trait]
impl DocumentExtractor for GeminiExtractor {
    async fn extract(&self, document: &Document) -> Result<Vec<ExtractedExpense>, ExtractionError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        );
        debug!(filename = document.filename(), kind = %document.kind(), "Sending document for extraction");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(document))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ExtractionError::Upstream(e.to_string()))?;

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::InvalidResponse(e.to_string()))?;

        let text = body
            .text()
            .ok_or_else(|| ExtractionError::InvalidResponse("empty model answer".to_string()))?;

        let records = parse_extraction_payload(&text)?;
        info!(filename = document.filename(), count = records.len(), "Document extracted");
        Ok(records)
    }
}
