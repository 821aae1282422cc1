//! Conversions between `SeaORM` models and domain types.

use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{DbErr, Set};

use outlay_core::approval::{
    ApprovalRule, ApprovalStep, ExpenseStatus, RuleKind, StepStatus, WorkflowStep,
};
use outlay_core::directory::User;
use outlay_core::expense::{Caller, Company, Expense, ExpenseSource, Role};
use outlay_core::store::StoreError;

use crate::entities::{
    approval_rules, approval_steps, companies, expenses,
    sea_orm_active_enums::{
        ExpenseSource as DbExpenseSource, ExpenseStatus as DbExpenseStatus, RuleType,
        StepStatus as DbStepStatus, UserRole,
    },
    users, workflow_steps,
};

pub(crate) fn store_err(err: DbErr) -> StoreError {
    StoreError::Database(err.to_string())
}

pub(crate) fn utc(value: DateTime<FixedOffset>) -> DateTime<Utc> {
    value.with_timezone(&Utc)
}

// ============================================================================
// Enums
// ============================================================================

pub(crate) fn expense_status_to_db(status: ExpenseStatus) -> DbExpenseStatus {
    match status {
        ExpenseStatus::Pending => DbExpenseStatus::Pending,
        ExpenseStatus::InReview => DbExpenseStatus::InReview,
        ExpenseStatus::Approved => DbExpenseStatus::Approved,
        ExpenseStatus::Rejected => DbExpenseStatus::Rejected,
    }
}

fn expense_status_from_db(status: DbExpenseStatus) -> ExpenseStatus {
    match status {
        DbExpenseStatus::Pending => ExpenseStatus::Pending,
        DbExpenseStatus::InReview => ExpenseStatus::InReview,
        DbExpenseStatus::Approved => ExpenseStatus::Approved,
        DbExpenseStatus::Rejected => ExpenseStatus::Rejected,
    }
}

pub(crate) fn step_status_to_db(status: StepStatus) -> DbStepStatus {
    match status {
        StepStatus::Pending => DbStepStatus::Pending,
        StepStatus::Approved => DbStepStatus::Approved,
        StepStatus::Rejected => DbStepStatus::Rejected,
    }
}

fn step_status_from_db(status: DbStepStatus) -> StepStatus {
    match status {
        DbStepStatus::Pending => StepStatus::Pending,
        DbStepStatus::Approved => StepStatus::Approved,
        DbStepStatus::Rejected => StepStatus::Rejected,
    }
}

fn source_to_db(source: ExpenseSource) -> DbExpenseSource {
    match source {
        ExpenseSource::Manual => DbExpenseSource::Manual,
        ExpenseSource::Ai => DbExpenseSource::Ai,
    }
}

fn source_from_db(source: DbExpenseSource) -> ExpenseSource {
    match source {
        DbExpenseSource::Manual => ExpenseSource::Manual,
        DbExpenseSource::Ai => ExpenseSource::Ai,
    }
}

pub(crate) fn role_to_db(role: Role) -> UserRole {
    match role {
        Role::Admin => UserRole::Admin,
        Role::Manager => UserRole::Manager,
        Role::Employee => UserRole::Employee,
    }
}

fn role_from_db(role: UserRole) -> Role {
    match role {
        UserRole::Admin => Role::Admin,
        UserRole::Manager => Role::Manager,
        UserRole::Employee => Role::Employee,
    }
}

fn rule_type_to_db(kind: &RuleKind) -> RuleType {
    match kind {
        RuleKind::Sequential => RuleType::Sequential,
        RuleKind::Percentage { .. } => RuleType::Percentage,
        RuleKind::SpecificApprover { .. } => RuleType::SpecificApprover,
        RuleKind::Hybrid { .. } => RuleType::Hybrid,
    }
}

fn rule_type_str(rule_type: RuleType) -> &'static str {
    match rule_type {
        RuleType::Sequential => "sequential",
        RuleType::Percentage => "percentage",
        RuleType::SpecificApprover => "specific_approver",
        RuleType::Hybrid => "hybrid",
    }
}

// ============================================================================
// Rows to domain
// ============================================================================

pub(crate) fn rule_from_row(
    row: approval_rules::Model,
    steps: Vec<workflow_steps::Model>,
) -> Result<ApprovalRule, StoreError> {
    let kind = RuleKind::from_parts(
        rule_type_str(row.rule_type),
        row.percentage_required,
        row.specific_approver_id,
    )
    .map_err(|e| StoreError::Corrupt(format!("approval rule {}: {e}", row.id)))?;

    let mut steps: Vec<WorkflowStep> = steps
        .into_iter()
        .map(|s| WorkflowStep {
            id: s.id,
            approver_id: s.approver_id,
            step_number: s.step_number,
            is_required: s.is_required,
        })
        .collect();
    steps.sort_by_key(|s| s.step_number);

    Ok(ApprovalRule {
        id: row.id,
        company_id: row.company_id,
        name: row.name,
        description: row.description,
        kind,
        is_manager_approver: row.is_manager_approver,
        priority: row.priority,
        is_active: row.is_active,
        steps,
        created_at: utc(row.created_at),
        updated_at: utc(row.updated_at),
    })
}

pub(crate) fn expense_from_row(row: expenses::Model) -> Expense {
    Expense {
        id: row.id,
        employee_id: row.employee_id,
        company_id: row.company_id,
        rule_id: row.rule_id,
        amount: row.amount,
        currency: row.currency,
        converted_amount: row.converted_amount,
        category: row.category,
        description: row.description,
        expense_date: row.expense_date,
        merchant_name: row.merchant_name,
        expense_type: row.expense_type,
        receipt_filename: row.receipt_filename,
        source: source_from_db(row.source),
        status: expense_status_from_db(row.status),
        current_approver_step: row.current_approver_step,
        created_at: utc(row.created_at),
        updated_at: utc(row.updated_at),
    }
}

pub(crate) fn step_from_row(row: approval_steps::Model) -> ApprovalStep {
    ApprovalStep {
        id: row.id,
        expense_id: row.expense_id,
        approver_id: row.approver_id,
        step_number: row.step_number,
        status: step_status_from_db(row.status),
        comments: row.comments,
        decided_at: row.decided_at.map(utc),
        created_at: utc(row.created_at),
    }
}

pub(crate) fn caller_from_row(row: users::Model) -> Caller {
    Caller {
        id: row.id,
        company_id: row.company_id,
        role: role_from_db(row.role),
        manager_id: row.manager_id,
    }
}

pub(crate) fn user_from_row(row: users::Model) -> User {
    User {
        id: row.id,
        company_id: row.company_id,
        email: row.email,
        full_name: row.full_name,
        role: role_from_db(row.role),
        manager_id: row.manager_id,
        created_at: utc(row.created_at),
        updated_at: utc(row.updated_at),
    }
}

pub(crate) fn company_from_row(row: companies::Model) -> Company {
    Company {
        id: row.id,
        name: row.name,
        currency: row.currency,
    }
}

// ============================================================================
// Domain to rows
// ============================================================================

pub(crate) fn company_to_row(company: &Company, at: DateTime<Utc>) -> companies::ActiveModel {
    companies::ActiveModel {
        id: Set(company.id),
        name: Set(company.name.clone()),
        currency: Set(company.currency.clone()),
        created_at: Set(at.into()),
        updated_at: Set(at.into()),
    }
}

pub(crate) fn user_to_row(user: &User) -> users::ActiveModel {
    users::ActiveModel {
        id: Set(user.id),
        company_id: Set(user.company_id),
        email: Set(user.email.clone()),
        full_name: Set(user.full_name.clone()),
        role: Set(role_to_db(user.role)),
        manager_id: Set(user.manager_id),
        created_at: Set(user.created_at.into()),
        updated_at: Set(user.updated_at.into()),
    }
}

pub(crate) fn rule_to_row(rule: &ApprovalRule) -> approval_rules::ActiveModel {
    approval_rules::ActiveModel {
        id: Set(rule.id),
        company_id: Set(rule.company_id),
        name: Set(rule.name.clone()),
        description: Set(rule.description.clone()),
        rule_type: Set(rule_type_to_db(&rule.kind)),
        percentage_required: Set(rule.kind.percentage_required().map(i32::from)),
        specific_approver_id: Set(rule.kind.specific_approver_id()),
        is_manager_approver: Set(rule.is_manager_approver),
        priority: Set(rule.priority),
        is_active: Set(rule.is_active),
        created_at: Set(rule.created_at.into()),
        updated_at: Set(rule.updated_at.into()),
    }
}

pub(crate) fn workflow_steps_to_rows(rule: &ApprovalRule) -> Vec<workflow_steps::ActiveModel> {
    rule.steps
        .iter()
        .map(|s| workflow_steps::ActiveModel {
            id: Set(s.id),
            rule_id: Set(rule.id),
            approver_id: Set(s.approver_id),
            step_number: Set(s.step_number),
            is_required: Set(s.is_required),
            created_at: Set(rule.updated_at.into()),
        })
        .collect()
}

pub(crate) fn expense_to_row(expense: &Expense) -> expenses::ActiveModel {
    expenses::ActiveModel {
        id: Set(expense.id),
        employee_id: Set(expense.employee_id),
        company_id: Set(expense.company_id),
        rule_id: Set(expense.rule_id),
        amount: Set(expense.amount),
        currency: Set(expense.currency.clone()),
        converted_amount: Set(expense.converted_amount),
        category: Set(expense.category.clone()),
        description: Set(expense.description.clone()),
        expense_date: Set(expense.expense_date),
        merchant_name: Set(expense.merchant_name.clone()),
        expense_type: Set(expense.expense_type.clone()),
        receipt_filename: Set(expense.receipt_filename.clone()),
        source: Set(source_to_db(expense.source)),
        status: Set(expense_status_to_db(expense.status)),
        current_approver_step: Set(expense.current_approver_step),
        created_at: Set(expense.created_at.into()),
        updated_at: Set(expense.updated_at.into()),
    }
}

pub(crate) fn step_to_row(step: &ApprovalStep) -> approval_steps::ActiveModel {
    approval_steps::ActiveModel {
        id: Set(step.id),
        expense_id: Set(step.expense_id),
        approver_id: Set(step.approver_id),
        step_number: Set(step.step_number),
        status: Set(step_status_to_db(step.status)),
        comments: Set(step.comments.clone()),
        decided_at: Set(step.decided_at.map(Into::into)),
        created_at: Set(step.created_at.into()),
    }
}
