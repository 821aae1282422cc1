//! Uploaded receipt documents.

use std::fmt;
use std::path::Path;

use crate::approval::error::WorkflowError;

/// Accepted document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// JPEG or PNG image.
    Image,
    /// PDF document.
    Pdf,
    /// Excel workbook.
    Spreadsheet,
}

impl DocumentKind {
    /// Maps a file extension (without the dot) to a kind and MIME type.
    fn from_extension(ext: &str) -> Option<(Self, &'static str)> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some((Self::Image, "image/jpeg")),
            "png" => Some((Self::Image, "image/png")),
            "pdf" => Some((Self::Pdf, "application/pdf")),
            "xlsx" => Some((
                Self::Spreadsheet,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            )),
            "xls" => Some((Self::Spreadsheet, "application/vnd.ms-excel")),
            _ => None,
        }
    }

    /// Human-readable name used in prompts and responses.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Pdf => "PDF",
            Self::Spreadsheet => "Excel",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A validated uploaded document.
#[derive(Clone)]
pub struct Document {
    filename: String,
    kind: DocumentKind,
    mime_type: &'static str,
    bytes: Vec<u8>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("filename", &self.filename)
            .field("kind", &self.kind)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Document {
    /// Validates an upload.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::Validation` for an empty file or an extension
    /// other than jpg, jpeg, png, pdf, xlsx or xls.
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Result<Self, WorkflowError> {
        let filename = filename.into();
        if bytes.is_empty() {
            return Err(WorkflowError::Validation("No file uploaded".to_string()));
        }

        let (kind, mime_type) = Path::new(&filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(DocumentKind::from_extension)
            .ok_or_else(|| {
                WorkflowError::Validation(
                    "Invalid file type. Only PDF, images (JPG, PNG) and Excel files are allowed"
                        .to_string(),
                )
            })?;

        Ok(Self {
            filename,
            kind,
            mime_type,
            bytes,
        })
    }

    /// Original file name.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Detected format.
    #[must_use]
    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// MIME type sent to the extractor.
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// Raw content.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}
