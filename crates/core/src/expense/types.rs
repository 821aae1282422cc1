//! Expense domain types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::approval::error::WorkflowError;
use crate::approval::instantiate::WorkflowOutcome;
use crate::approval::types::{ApprovalStep, ExpenseStatus};
use crate::currency::conversion::{
    AMOUNT_MAX_INTEGER_DIGITS, AMOUNT_MAX_SCALE, fits_amount_column,
};

/// A user's role in the company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Manages rules and sees every expense.
    Admin,
    /// Approves expenses and sees company expenses.
    Manager,
    /// Submits expenses.
    Employee,
}

impl Role {
    /// Returns the string representation of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Employee => "employee",
        }
    }

    /// Parses a role from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "manager" => Some(Self::Manager),
            "employee" => Some(Self::Employee),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The identity of an authenticated caller, as resolved from the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Caller {
    /// User ID.
    pub id: Uuid,
    /// Company the user belongs to.
    pub company_id: Uuid,
    /// Role within the company.
    pub role: Role,
    /// The user's manager, if any.
    pub manager_id: Option<Uuid>,
}

impl Caller {
    /// Returns true for company admins.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Returns true if the caller may list every expense of the company.
    #[must_use]
    pub fn can_view_company_expenses(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Manager)
    }
}

/// A company and its reporting currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Company {
    /// Company ID.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// ISO 4217 code amounts are converted into.
    pub currency: String,
}

/// How an expense was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseSource {
    /// Entered by the employee.
    Manual,
    /// Extracted from an uploaded document.
    Ai,
}

impl ExpenseSource {
    /// Returns the string representation of the source.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Ai => "ai",
        }
    }
}

/// An expense claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Expense {
    /// Expense ID.
    pub id: Uuid,
    /// Submitter.
    pub employee_id: Uuid,
    /// Submitter's company.
    pub company_id: Uuid,
    /// The rule that governed the workflow, if any.
    pub rule_id: Option<Uuid>,
    /// Amount in the submitted currency.
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    /// Submitted currency.
    pub currency: String,
    /// Amount in the company currency (the original amount when conversion
    /// failed).
    #[serde(with = "rust_decimal::serde::str")]
    pub converted_amount: Decimal,
    /// Category.
    pub category: String,
    /// Description.
    pub description: String,
    /// Date the expense was incurred.
    pub expense_date: NaiveDate,
    /// Merchant, if known.
    pub merchant_name: Option<String>,
    /// Free-form type (Meal, Flight, ...).
    pub expense_type: Option<String>,
    /// Uploaded document name for extracted expenses.
    pub receipt_filename: Option<String>,
    /// How the expense was created.
    pub source: ExpenseSource,
    /// Lifecycle status.
    pub status: ExpenseStatus,
    /// Advisory pointer to the next step expected to act.
    pub current_approver_step: i32,
    /// Created at timestamp.
    pub created_at: DateTime<Utc>,
    /// Updated at timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Input for a manually entered expense.
#[derive(Debug, Clone)]
pub struct NewExpense {
    /// Amount in `currency`.
    pub amount: Decimal,
    /// ISO 4217 code.
    pub currency: String,
    /// Category.
    pub category: String,
    /// Description.
    pub description: String,
    /// Defaults to today.
    pub expense_date: Option<NaiveDate>,
    /// Merchant, if known.
    pub merchant_name: Option<String>,
    /// Free-form type.
    pub expense_type: Option<String>,
}

impl NewExpense {
    /// Validates and normalizes the input.
    ///
    /// Currency codes are upper-cased; category and description are trimmed.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::Validation` for a negative amount, an amount
    /// the amount columns cannot hold, a currency that is not three letters,
    /// or a blank category or description.
    pub fn validate(mut self) -> Result<Self, WorkflowError> {
        if self.amount.is_sign_negative() {
            return Err(WorkflowError::Validation(
                "amount must not be negative".to_string(),
            ));
        }
        if !fits_amount_column(self.amount) {
            return Err(WorkflowError::Validation(format!(
                "amount must have at most {AMOUNT_MAX_INTEGER_DIGITS} integer digits \
                 and {AMOUNT_MAX_SCALE} decimal places"
            )));
        }

        let currency = self.currency.trim().to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(WorkflowError::Validation(format!(
                "invalid currency code: {}",
                self.currency
            )));
        }
        self.currency = currency;

        self.category = self.category.trim().to_string();
        if self.category.is_empty() {
            return Err(WorkflowError::Validation("category is required".to_string()));
        }

        self.description = self.description.trim().to_string();
        if self.description.is_empty() {
            return Err(WorkflowError::Validation(
                "description is required".to_string(),
            ));
        }

        Ok(self)
    }
}

/// An expense with its approval steps.
#[derive(Debug, Clone, Serialize)]
pub struct ExpenseWithSteps {
    /// The expense.
    #[serde(flatten)]
    pub expense: Expense,
    /// Its steps, ordered by step number.
    pub steps: Vec<ApprovalStep>,
}

/// A pending step joined with its expense.
#[derive(Debug, Clone, Serialize)]
pub struct PendingApproval {
    /// The step awaiting the approver.
    pub step: ApprovalStep,
    /// The expense it belongs to.
    pub expense: Expense,
}

/// A submitted expense and how its workflow started.
#[derive(Debug, Clone, Serialize)]
pub struct SubmittedExpense {
    /// The stored expense.
    #[serde(flatten)]
    pub expense: Expense,
    /// The created steps.
    pub steps: Vec<ApprovalStep>,
    /// How the submission concluded.
    pub outcome: WorkflowOutcome,
}

/// The result of a recorded decision.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    /// The decided step.
    pub step: ApprovalStep,
    /// The expense after resolution.
    pub expense: Expense,
    /// Whether this decision moved the expense to a terminal status.
    pub transitioned: bool,
}
