//! Receipt document extraction.
//!
//! An uploaded document is sent to an extraction model which answers with
//! zero or more expense records; each record becomes its own expense.

pub mod document;
pub mod error;
pub mod gemini;
pub mod record;

use async_trait::async_trait;

pub use document::{Document, DocumentKind};
pub use error::ExtractionError;
pub use gemini::GeminiExtractor;
pub use record::{ExtractedExpense, parse_extraction_payload};

/// Turns a document into expense records.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Extracts every expense line in `document`.
    async fn extract(&self, document: &Document) -> Result<Vec<ExtractedExpense>, ExtractionError>;
}

/// Extractor that answers every document with the same records.
#[derive(Debug, Clone, Default)]
pub struct FixedExtractor {
    records: Vec<ExtractedExpense>,
}

impl FixedExtractor {
    /// Creates an extractor returning `records`.
    #[must_use]
    pub fn new(records: Vec<ExtractedExpense>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl DocumentExtractor for FixedExtractor {
    async fn extract(&self, _document: &Document) -> Result<Vec<ExtractedExpense>, ExtractionError> {
        Ok(self.records.clone())
    }
}
