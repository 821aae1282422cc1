//! Directory error types.

use outlay_shared::AppError;
use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

/// Errors from user and company management.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// User not found (or a member of another company).
    #[error("User {0} not found")]
    UserNotFound(Uuid),

    /// Another user already has the email address.
    #[error("Email {0} is already registered")]
    EmailTaken(String),

    /// Storage backend failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DirectoryError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::UserNotFound(_) => 404,
            Self::EmailTaken(_) => 409,
            Self::Store(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::EmailTaken(_) => "EMAIL_TAKEN",
            Self::Store(_) => "DATABASE_ERROR",
        }
    }
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Store(e) => Self::Database(e.to_string()),
            other => Self::Domain {
                status: other.status_code(),
                code: other.error_code(),
                message: other.to_string(),
            },
        }
    }
}
