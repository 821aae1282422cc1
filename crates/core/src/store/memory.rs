//! In-process store backed by a single `tokio::sync::RwLock`.
//!
//! Every operation runs under one lock, so each write is atomic and the
//! conditional updates behave like their Postgres counterparts.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    DecisionRecord, DirectoryStore, ExpenseStore, ResolveFn, RuleStore, StepDecision, StoreError,
    Submission,
};
use crate::approval::resolver::Resolution;
use crate::approval::rule::ApprovalRule;
use crate::approval::types::{ApprovalStep, ExpenseStatus};
use crate::directory::types::User;
use crate::expense::types::{Caller, Company, Expense, ExpenseWithSteps, PendingApproval};

#[derive(Default)]
struct State {
    companies: Vec<Company>,
    users: Vec<User>,
    rules: Vec<ApprovalRule>,
    expenses: Vec<Expense>,
    steps: Vec<ApprovalStep>,
}

impl State {
    fn email_taken(&self, email: &str) -> bool {
        self.users.iter().any(|u| u.email.eq_ignore_ascii_case(email))
    }

    fn steps_of(&self, expense_id: Uuid) -> Vec<ApprovalStep> {
        let mut steps: Vec<_> = self
            .steps
            .iter()
            .filter(|s| s.expense_id == expense_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.step_number);
        steps
    }

    /// Newest first; insertion order breaks timestamp ties.
    fn newest_first<'a>(&self, expenses: impl DoubleEndedIterator<Item = &'a Expense>) -> Vec<ExpenseWithSteps> {
        let mut list: Vec<_> = expenses.rev().cloned().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list.into_iter()
            .map(|expense| ExpenseWithSteps {
                steps: self.steps_of(expense.id),
                expense,
            })
            .collect()
    }
}

/// In-memory implementation of every store trait.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a company.
    pub async fn insert_company(&self, company: Company) {
        let mut state = self.state.write().await;
        state.companies.retain(|c| c.id != company.id);
        state.companies.push(company);
    }

    /// Adds or replaces a user with a placeholder email and name.
    pub async fn insert_caller(&self, caller: Caller) {
        let now = Utc::now();
        let user = User {
            id: caller.id,
            company_id: caller.company_id,
            email: format!("{}@outlay.test", caller.id),
            full_name: caller.role.to_string(),
            role: caller.role,
            manager_id: caller.manager_id,
            created_at: now,
            updated_at: now,
        };
        let mut state = self.state.write().await;
        state.users.retain(|u| u.id != user.id);
        state.users.push(user);
    }
}

#[async_trait]
impl RuleStore for InMemoryStore {
    async fn active_rules(&self, company_id: Uuid) -> Result<Vec<ApprovalRule>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .rules
            .iter()
            .filter(|r| r.company_id == company_id && r.is_active)
            .cloned()
            .collect())
    }

    async fn list_rules(&self, company_id: Uuid) -> Result<Vec<ApprovalRule>, StoreError> {
        let state = self.state.read().await;
        let mut rules: Vec<_> = state
            .rules
            .iter()
            .filter(|r| r.company_id == company_id)
            .cloned()
            .collect();
        rules.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(rules)
    }

    async fn find_rule(
        &self,
        company_id: Uuid,
        rule_id: Uuid,
    ) -> Result<Option<ApprovalRule>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .rules
            .iter()
            .find(|r| r.id == rule_id && r.company_id == company_id)
            .cloned())
    }

    async fn insert_rule(&self, rule: &ApprovalRule) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.rules.push(rule.clone());
        Ok(())
    }

    async fn update_rule(&self, rule: &ApprovalRule) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let stored = state
            .rules
            .iter_mut()
            .find(|r| r.id == rule.id)
            .ok_or_else(|| StoreError::Database(format!("rule {} not found", rule.id)))?;
        *stored = rule.clone();
        Ok(())
    }

    async fn delete_rule(&self, company_id: Uuid, rule_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let before = state.rules.len();
        state
            .rules
            .retain(|r| !(r.id == rule_id && r.company_id == company_id));
        Ok(state.rules.len() < before)
    }
}

#[async_trait]
impl ExpenseStore for InMemoryStore {
    async fn create_submissions(&self, batch: &[Submission]) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        for submission in batch {
            state.expenses.push(submission.expense.clone());
            state.steps.extend(submission.steps.iter().cloned());
        }
        Ok(())
    }

    async fn find_expense(&self, expense_id: Uuid) -> Result<Option<Expense>, StoreError> {
        let state = self.state.read().await;
        Ok(state.expenses.iter().find(|e| e.id == expense_id).cloned())
    }

    async fn steps_for_expense(&self, expense_id: Uuid) -> Result<Vec<ApprovalStep>, StoreError> {
        let state = self.state.read().await;
        Ok(state.steps_of(expense_id))
    }

    async fn record_decision(
        &self,
        decision: &StepDecision,
        resolve: ResolveFn<'_>,
    ) -> Result<DecisionRecord, StoreError> {
        let mut state = self.state.write().await;

        let Some(step_idx) = state
            .steps
            .iter()
            .position(|s| s.id == decision.step_id && s.approver_id == decision.approver_id)
        else {
            return Ok(DecisionRecord::StepNotFound);
        };
        if !state.steps[step_idx].status.is_pending() {
            return Ok(DecisionRecord::AlreadyDecided);
        }

        let expense_id = state.steps[step_idx].expense_id;
        let expense_idx = state
            .expenses
            .iter()
            .position(|e| e.id == expense_id)
            .ok_or_else(|| StoreError::Corrupt(format!("step {} has no expense", decision.step_id)))?;

        {
            let step = &mut state.steps[step_idx];
            step.status = decision.status;
            step.comments.clone_from(&decision.comments);
            step.decided_at = Some(decision.decided_at);
        }
        let step = state.steps[step_idx].clone();
        let resolution = resolve(&step, &state.steps_of(expense_id));

        let expense = &mut state.expenses[expense_idx];
        let mut transitioned = false;
        if expense.status == ExpenseStatus::InReview {
            match resolution.terminal_status() {
                Some(status) => {
                    expense.status = status;
                    transitioned = true;
                }
                None => {
                    if let Resolution::Advance { next_step } = resolution {
                        expense.current_approver_step = next_step;
                    }
                }
            }
            expense.updated_at = Utc::now();
        }

        Ok(DecisionRecord::Recorded {
            step,
            expense: expense.clone(),
            resolution,
            transitioned,
        })
    }

    async fn pending_for_approver(
        &self,
        approver_id: Uuid,
    ) -> Result<Vec<PendingApproval>, StoreError> {
        let state = self.state.read().await;
        let mut pending: Vec<_> = state
            .steps
            .iter()
            .filter(|s| s.approver_id == approver_id && s.status.is_pending())
            .filter_map(|s| {
                state
                    .expenses
                    .iter()
                    .find(|e| e.id == s.expense_id && e.status == ExpenseStatus::InReview)
                    .map(|e| PendingApproval {
                        step: s.clone(),
                        expense: e.clone(),
                    })
            })
            .collect();
        pending.sort_by_key(|p| p.step.created_at);
        Ok(pending)
    }

    async fn expenses_for_employee(
        &self,
        employee_id: Uuid,
    ) -> Result<Vec<ExpenseWithSteps>, StoreError> {
        let state = self.state.read().await;
        Ok(state.newest_first(state.expenses.iter().filter(|e| e.employee_id == employee_id)))
    }

    async fn expenses_for_company(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<ExpenseWithSteps>, StoreError> {
        let state = self.state.read().await;
        Ok(state.newest_first(state.expenses.iter().filter(|e| e.company_id == company_id)))
    }

    async fn stalled_expenses(&self, company_id: Uuid) -> Result<Vec<Expense>, StoreError> {
        let state = self.state.read().await;
        let mut stalled: Vec<_> = state
            .expenses
            .iter()
            .filter(|e| e.company_id == company_id && e.status == ExpenseStatus::Pending)
            .cloned()
            .collect();
        stalled.sort_by_key(|e| e.created_at);
        Ok(stalled)
    }

    async fn escalate(&self, step: &ApprovalStep) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let Some(expense) = state
            .expenses
            .iter_mut()
            .find(|e| e.id == step.expense_id && e.status == ExpenseStatus::Pending)
        else {
            return Ok(false);
        };
        expense.status = ExpenseStatus::InReview;
        expense.current_approver_step = step.step_number;
        expense.updated_at = Utc::now();
        state.steps.push(step.clone());
        Ok(true)
    }
}

#[async_trait]
impl DirectoryStore for InMemoryStore {
    async fn find_caller(&self, user_id: Uuid) -> Result<Option<Caller>, StoreError> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.id == user_id).map(User::caller))
    }

    async fn find_company(&self, company_id: Uuid) -> Result<Option<Company>, StoreError> {
        let state = self.state.read().await;
        Ok(state.companies.iter().find(|c| c.id == company_id).cloned())
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn list_users(&self, company_id: Uuid) -> Result<Vec<User>, StoreError> {
        let state = self.state.read().await;
        let mut users: Vec<_> = state
            .users
            .iter()
            .filter(|u| u.company_id == company_id)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.full_name.cmp(&b.full_name).then_with(|| a.email.cmp(&b.email)));
        Ok(users)
    }

    async fn insert_user(&self, user: &User) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        if state.email_taken(&user.email) {
            return Ok(false);
        }
        state.users.push(user.clone());
        Ok(true)
    }

    async fn update_user(&self, user: &User) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let Some(stored) = state
            .users
            .iter_mut()
            .find(|u| u.id == user.id && u.company_id == user.company_id)
        else {
            return Ok(false);
        };
        stored.role = user.role;
        stored.manager_id = user.manager_id;
        stored.updated_at = user.updated_at;
        Ok(true)
    }

    async fn register_company(&self, company: &Company, admin: &User) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        if state.email_taken(&admin.email) {
            return Ok(false);
        }
        state.companies.push(company.clone());
        state.users.push(admin.clone());
        Ok(true)
    }
}
