//! Expense approval engine.
//!
//! # Modules
//!
//! - `types` - Expense and step statuses, decisions, approval steps
//! - `rule` - Approval rules, rule kinds and validation
//! - `selector` - Picks the rule that governs a new expense
//! - `instantiate` - Materializes approval steps from the selected rule
//! - `resolver` - Folds a decision into the expense status
//! - `error` - Workflow-specific error types

pub mod error;
pub mod instantiate;
pub mod resolver;
pub mod rule;
pub mod selector;
pub mod types;

#[cfg(test)]
mod approval_props;

pub use error::WorkflowError;
pub use instantiate::{
    DeadEndPolicy, PlannedStep, StepOrigin, WorkflowInstantiator, WorkflowOutcome, WorkflowPlan,
};
pub use resolver::{ApprovalResolver, Resolution};
pub use rule::{
    ApprovalRule, CompletionPolicy, RuleDraft, RuleKind, RuleUpdate, StepDraft, WorkflowStep,
};
pub use selector::RuleSelector;
pub use types::{ApprovalStep, Decision, ExpenseStatus, StepStatus};
