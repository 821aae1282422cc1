//! Workflow error types for expense approval.
//!
//! This module defines all error types that can occur while submitting
//! expenses, recording decisions and managing approval rules.

use outlay_shared::AppError;
use thiserror::Error;
use uuid::Uuid;

use crate::approval::types::ExpenseStatus;
use crate::extraction::ExtractionError;
use crate::store::StoreError;

/// Errors that can occur during workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Approval rule not found (or owned by another company).
    #[error("Approval rule {0} not found")]
    RuleNotFound(Uuid),

    /// Expense not found.
    #[error("Expense {0} not found")]
    ExpenseNotFound(Uuid),

    /// Approval step not found, or the caller is not its approver.
    #[error("Approval step {0} not found")]
    StepNotFound(Uuid),

    /// Approval step already left `pending`.
    #[error("Approval step {step_id} has already been decided")]
    AlreadyDecided {
        /// The step that was decided twice.
        step_id: Uuid,
    },

    /// Attempted an invalid status transition.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// The current status.
        from: ExpenseStatus,
        /// The attempted target status.
        to: ExpenseStatus,
    },

    /// Escalation requested for an expense that is not stalled.
    #[error("Expense {0} is not stalled")]
    NotStalled(Uuid),

    /// Document extraction failed; nothing was created.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Storage backend failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkflowError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::InvalidTransition { .. } => 400,

            Self::RuleNotFound(_) | Self::ExpenseNotFound(_) | Self::StepNotFound(_) => 404,

            Self::AlreadyDecided { .. } | Self::NotStalled(_) => 409,

            Self::Extraction(e) => e.status_code(),

            Self::Store(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::RuleNotFound(_) => "RULE_NOT_FOUND",
            Self::ExpenseNotFound(_) => "EXPENSE_NOT_FOUND",
            Self::StepNotFound(_) => "APPROVAL_NOT_FOUND",
            Self::AlreadyDecided { .. } => "ALREADY_DECIDED",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::NotStalled(_) => "NOT_STALLED",
            Self::Extraction(e) => e.error_code(),
            Self::Store(_) => "DATABASE_ERROR",
        }
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Store(e) => Self::Database(e.to_string()),
            other => Self::Domain {
                status: other.status_code(),
                code: other.error_code(),
                message: other.to_string(),
            },
        }
    }
}
