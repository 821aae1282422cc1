//! Storage boundaries for rules, expenses and the user directory.
//!
//! The SeaORM repositories in `outlay-db` implement these traits against
//! Postgres; `memory` implements them in process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::approval::resolver::Resolution;
use crate::approval::rule::ApprovalRule;
use crate::approval::types::{ApprovalStep, StepStatus};
use crate::directory::types::User;
use crate::expense::types::{Caller, Company, Expense, ExpenseWithSteps, PendingApproval};

pub mod memory;

pub use memory::InMemoryStore;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend failure.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored row could not be mapped to a domain value.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// An expense and the steps created with it, persisted together.
#[derive(Debug, Clone)]
pub struct Submission {
    /// The new expense.
    pub expense: Expense,
    /// Its initial steps.
    pub steps: Vec<ApprovalStep>,
}

/// A decision to record on a step.
#[derive(Debug, Clone)]
pub struct StepDecision {
    /// The step being decided.
    pub step_id: Uuid,
    /// The caller; must be the step's approver.
    pub approver_id: Uuid,
    /// `Approved` or `Rejected`.
    pub status: StepStatus,
    /// Approver's comments.
    pub comments: Option<String>,
    /// Decision time.
    pub decided_at: DateTime<Utc>,
}

/// Computes the expense effect from the decided step and all steps of its
/// expense, read after the step write.
pub type ResolveFn<'a> = &'a (dyn Fn(&ApprovalStep, &[ApprovalStep]) -> Resolution + Send + Sync);

/// What recording a decision did.
#[derive(Debug, Clone)]
pub enum DecisionRecord {
    /// The step was decided and the resolution applied.
    Recorded {
        /// The decided step.
        step: ApprovalStep,
        /// The expense as stored afterwards.
        expense: Expense,
        /// The computed resolution.
        resolution: Resolution,
        /// Whether this decision changed the expense's status.
        transitioned: bool,
    },
    /// No such step for this approver.
    StepNotFound,
    /// The step already left `pending`.
    AlreadyDecided,
}

/// Approval rule persistence.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Active rules of a company, with steps.
    async fn active_rules(&self, company_id: Uuid) -> Result<Vec<ApprovalRule>, StoreError>;

    /// All rules of a company, priority descending then newest first.
    async fn list_rules(&self, company_id: Uuid) -> Result<Vec<ApprovalRule>, StoreError>;

    /// A rule of the company, with steps.
    async fn find_rule(
        &self,
        company_id: Uuid,
        rule_id: Uuid,
    ) -> Result<Option<ApprovalRule>, StoreError>;

    /// Inserts a rule and its steps.
    async fn insert_rule(&self, rule: &ApprovalRule) -> Result<(), StoreError>;

    /// Overwrites a rule and replaces its steps.
    async fn update_rule(&self, rule: &ApprovalRule) -> Result<(), StoreError>;

    /// Deletes a rule and its steps. Returns false if it did not exist.
    async fn delete_rule(&self, company_id: Uuid, rule_id: Uuid) -> Result<bool, StoreError>;
}

/// Expense and approval step persistence.
#[async_trait]
pub trait ExpenseStore: Send + Sync {
    /// Writes expenses with their steps; all or nothing.
    async fn create_submissions(&self, batch: &[Submission]) -> Result<(), StoreError>;

    /// An expense by ID.
    async fn find_expense(&self, expense_id: Uuid) -> Result<Option<Expense>, StoreError>;

    /// The steps of an expense, ordered by step number.
    async fn steps_for_expense(&self, expense_id: Uuid) -> Result<Vec<ApprovalStep>, StoreError>;

    /// Records a decision and applies its resolution atomically.
    ///
    /// The step write is conditional on the step being `pending`. A terminal
    /// expense status is only written while the expense is `in_review`, and
    /// the advisory pointer likewise, so concurrent decisions that reach the
    /// same conclusion are idempotent and a late decision on a finalized
    /// expense leaves it untouched.
    async fn record_decision(
        &self,
        decision: &StepDecision,
        resolve: ResolveFn<'_>,
    ) -> Result<DecisionRecord, StoreError>;

    /// Pending steps of the approver whose expense is `in_review`, oldest
    /// first.
    async fn pending_for_approver(
        &self,
        approver_id: Uuid,
    ) -> Result<Vec<PendingApproval>, StoreError>;

    /// Expenses of an employee, newest first.
    async fn expenses_for_employee(
        &self,
        employee_id: Uuid,
    ) -> Result<Vec<ExpenseWithSteps>, StoreError>;

    /// Expenses of a company, newest first.
    async fn expenses_for_company(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<ExpenseWithSteps>, StoreError>;

    /// Stalled (`pending`) expenses of a company, oldest first.
    async fn stalled_expenses(&self, company_id: Uuid) -> Result<Vec<Expense>, StoreError>;

    /// Moves a stalled expense to `in_review` with `step` as its only step.
    ///
    /// Conditional on the expense still being `pending`. Returns false if it
    /// was not.
    async fn escalate(&self, step: &ApprovalStep) -> Result<bool, StoreError>;
}

/// Companies and their users.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// A user's identity.
    async fn find_caller(&self, user_id: Uuid) -> Result<Option<Caller>, StoreError>;

    /// A company.
    async fn find_company(&self, company_id: Uuid) -> Result<Option<Company>, StoreError>;

    /// A user's directory entry.
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    /// Users of a company, ordered by name.
    async fn list_users(&self, company_id: Uuid) -> Result<Vec<User>, StoreError>;

    /// Inserts a user. Returns false if the email is already registered.
    async fn insert_user(&self, user: &User) -> Result<bool, StoreError>;

    /// Overwrites a user's role and manager. Returns false if the user does
    /// not exist in its company.
    async fn update_user(&self, user: &User) -> Result<bool, StoreError>;

    /// Inserts a company together with its first admin; all or nothing.
    /// Returns false if the admin's email is already registered.
    async fn register_company(&self, company: &Company, admin: &User) -> Result<bool, StoreError>;
}
