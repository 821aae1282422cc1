//! Expense lifecycle state machine.

use crate::approval::error::WorkflowError;
use crate::approval::types::ExpenseStatus;

/// Stateless guard for expense status transitions.
pub struct ExpenseLifecycle;

impl ExpenseLifecycle {
    /// Returns true if `from → to` is a valid transition.
    #[must_use]
    pub fn can_transition(from: ExpenseStatus, to: ExpenseStatus) -> bool {
        matches!(
            (from, to),
            (ExpenseStatus::Pending, ExpenseStatus::InReview)
                | (ExpenseStatus::Pending, ExpenseStatus::Approved)
                | (ExpenseStatus::InReview, ExpenseStatus::Approved)
                | (ExpenseStatus::InReview, ExpenseStatus::Rejected)
        )
    }

    /// Validates a transition.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::InvalidTransition` if not allowed.
    pub fn transition(from: ExpenseStatus, to: ExpenseStatus) -> Result<ExpenseStatus, WorkflowError> {
        if Self::can_transition(from, to) {
            Ok(to)
        } else {
            Err(WorkflowError::InvalidTransition { from, to })
        }
    }
}
