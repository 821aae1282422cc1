//! Expenses: domain types, lifecycle guard and the workflow service.

pub mod lifecycle;
pub mod service;
pub mod types;

pub use lifecycle::ExpenseLifecycle;
pub use service::ExpenseService;
pub use types::{
    Caller, Company, DecisionOutcome, Expense, ExpenseSource, ExpenseWithSteps, NewExpense,
    PendingApproval, Role, SubmittedExpense,
};
