//! Document extraction errors.

use thiserror::Error;

/// Errors from the document-extraction service. Any of them aborts the
/// whole upload.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// No extraction service is configured.
    #[error("Document extraction is not configured")]
    NotConfigured,

    /// The service could not be reached or answered with an error.
    #[error("Document extraction failed: {0}")]
    Upstream(String),

    /// The service answered with something that is not expense data.
    #[error("Document extraction returned an invalid format: {0}")]
    InvalidResponse(String),
}

impl ExtractionError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotConfigured => 503,
            Self::Upstream(_) | Self::InvalidResponse(_) => 502,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotConfigured => "EXTRACTION_UNAVAILABLE",
            Self::Upstream(_) | Self::InvalidResponse(_) => "EXTRACTION_FAILED",
        }
    }
}
