//! Status types shared by the approval engine and the expense lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Expense status in the approval workflow.
///
/// The valid transitions are:
/// - Pending → InReview (workflow instantiated)
/// - InReview → Approved (no higher step left pending)
/// - InReview → Rejected (any step rejected)
/// - Pending → Approved (auto-approve dead-end policy only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    /// Submitted, no workflow running yet.
    Pending,
    /// Waiting on approval steps.
    InReview,
    /// Approved (immutable).
    Approved,
    /// Rejected (immutable).
    Rejected,
}

impl ExpenseStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InReview => "in_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_review" => Some(Self::InReview),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Returns true if the expense accepts no further transitions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a single approval step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Awaiting a decision.
    Pending,
    /// Approved by its approver.
    Approved,
    /// Rejected by its approver.
    Rejected,
}

impl StepStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Returns true while the step still awaits a decision.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A decision recorded by an approver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Approve the step.
    Approved,
    /// Reject the step, and with it the expense.
    Rejected,
}

impl Decision {
    /// The step status this decision writes.
    #[must_use]
    pub fn step_status(self) -> StepStatus {
        match self {
            Self::Approved => StepStatus::Approved,
            Self::Rejected => StepStatus::Rejected,
        }
    }

    /// Parses a decision from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// An expense-specific required decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalStep {
    /// Step ID.
    pub id: Uuid,
    /// Owning expense.
    pub expense_id: Uuid,
    /// Who must decide.
    pub approver_id: Uuid,
    /// Position in the workflow; 0 is the manager-first step.
    pub step_number: i32,
    /// Leaves `pending` at most once.
    pub status: StepStatus,
    /// Approver's comments.
    pub comments: Option<String>,
    /// When the decision was recorded.
    pub decided_at: Option<DateTime<Utc>>,
    /// Created at timestamp.
    pub created_at: DateTime<Utc>,
}
