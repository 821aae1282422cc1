//! Expense and approval step repository.
//!
//! Status changes are conditional updates (`UPDATE ... WHERE status = ...`)
//! checked through `rows_affected`, so concurrent decisions never overwrite
//! each other and terminal statuses stay sticky.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use outlay_core::approval::{ApprovalStep, ExpenseStatus, Resolution, StepStatus};
use outlay_core::expense::{Expense, ExpenseWithSteps, PendingApproval};
use outlay_core::store::{
    DecisionRecord, ExpenseStore, ResolveFn, StepDecision, StoreError, Submission,
};

use super::mapping::{
    expense_from_row, expense_status_to_db, expense_to_row, step_from_row, step_status_to_db,
    step_to_row, store_err,
};
use crate::entities::{approval_steps, expenses};

/// Repository for expenses and their approval steps.
#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    db: DatabaseConnection,
}

impl ExpenseRepository {
    /// Creates a new expense repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn steps_of<C: ConnectionTrait>(
        conn: &C,
        expense_id: Uuid,
    ) -> Result<Vec<ApprovalStep>, StoreError> {
        Ok(approval_steps::Entity::find()
            .filter(approval_steps::Column::ExpenseId.eq(expense_id))
            .order_by_asc(approval_steps::Column::StepNumber)
            .all(conn)
            .await
            .map_err(store_err)?
            .into_iter()
            .map(step_from_row)
            .collect())
    }

    async fn with_steps(
        &self,
        rows: Vec<expenses::Model>,
    ) -> Result<Vec<ExpenseWithSteps>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut steps: HashMap<Uuid, Vec<ApprovalStep>> = HashMap::new();
        for step in approval_steps::Entity::find()
            .filter(approval_steps::Column::ExpenseId.is_in(ids))
            .order_by_asc(approval_steps::Column::StepNumber)
            .all(&self.db)
            .await
            .map_err(store_err)?
        {
            steps
                .entry(step.expense_id)
                .or_default()
                .push(step_from_row(step));
        }

        Ok(rows
            .into_iter()
            .map(|row| ExpenseWithSteps {
                steps: steps.remove(&row.id).unwrap_or_default(),
                expense: expense_from_row(row),
            })
            .collect())
    }
}

#[async_trait]
impl ExpenseStore for ExpenseRepository {
    async fn create_submissions(&self, batch: &[Submission]) -> Result<(), StoreError> {
        let txn = self.db.begin().await.map_err(store_err)?;

        for submission in batch {
            expense_to_row(&submission.expense)
                .insert(&txn)
                .await
                .map_err(store_err)?;
            if !submission.steps.is_empty() {
                approval_steps::Entity::insert_many(submission.steps.iter().map(step_to_row))
                    .exec(&txn)
                    .await
                    .map_err(store_err)?;
            }
        }

        txn.commit().await.map_err(store_err)?;
        debug!(count = batch.len(), "Inserted expense submissions");
        Ok(())
    }

    async fn find_expense(&self, expense_id: Uuid) -> Result<Option<Expense>, StoreError> {
        Ok(expenses::Entity::find_by_id(expense_id)
            .one(&self.db)
            .await
            .map_err(store_err)?
            .map(expense_from_row))
    }

    async fn steps_for_expense(&self, expense_id: Uuid) -> Result<Vec<ApprovalStep>, StoreError> {
        Self::steps_of(&self.db, expense_id).await
    }

    async fn record_decision(
        &self,
        decision: &StepDecision,
        resolve: ResolveFn<'_>,
    ) -> Result<DecisionRecord, StoreError> {
        let txn = self.db.begin().await.map_err(store_err)?;

        let Some(step) = approval_steps::Entity::find_by_id(decision.step_id)
            .filter(approval_steps::Column::ApproverId.eq(decision.approver_id))
            .one(&txn)
            .await
            .map_err(store_err)?
        else {
            return Ok(DecisionRecord::StepNotFound);
        };
        let expense_id = step.expense_id;

        let decided = approval_steps::Entity::update_many()
            .set(approval_steps::ActiveModel {
                status: Set(step_status_to_db(decision.status)),
                comments: Set(decision.comments.clone()),
                decided_at: Set(Some(decision.decided_at.into())),
                ..Default::default()
            })
            .filter(approval_steps::Column::Id.eq(decision.step_id))
            .filter(approval_steps::Column::Status.eq(step_status_to_db(StepStatus::Pending)))
            .exec(&txn)
            .await
            .map_err(store_err)?;
        if decided.rows_affected == 0 {
            return Ok(DecisionRecord::AlreadyDecided);
        }

        // Read back inside the transaction so the resolver sees this decision.
        let steps = Self::steps_of(&txn, expense_id).await?;
        let step = steps
            .iter()
            .find(|s| s.id == decision.step_id)
            .cloned()
            .ok_or_else(|| StoreError::Corrupt(format!("step {} vanished", decision.step_id)))?;
        let resolution = resolve(&step, &steps);

        // Only an in_review expense is written, so a late decision on a
        // finalized expense leaves it untouched.
        let mut changes = expenses::ActiveModel {
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };
        let terminal = resolution.terminal_status();
        match (terminal, resolution) {
            (Some(status), _) => changes.status = Set(expense_status_to_db(status)),
            (None, Resolution::Advance { next_step }) => {
                changes.current_approver_step = Set(next_step);
            }
            (None, _) => {}
        }
        let written = expenses::Entity::update_many()
            .set(changes)
            .filter(expenses::Column::Id.eq(expense_id))
            .filter(expenses::Column::Status.eq(expense_status_to_db(ExpenseStatus::InReview)))
            .exec(&txn)
            .await
            .map_err(store_err)?;
        let transitioned = terminal.is_some() && written.rows_affected > 0;

        let expense = expenses::Entity::find_by_id(expense_id)
            .one(&txn)
            .await
            .map_err(store_err)?
            .map(expense_from_row)
            .ok_or_else(|| StoreError::Corrupt(format!("step {} has no expense", step.id)))?;

        txn.commit().await.map_err(store_err)?;

        Ok(DecisionRecord::Recorded {
            step,
            expense,
            resolution,
            transitioned,
        })
    }

    async fn pending_for_approver(
        &self,
        approver_id: Uuid,
    ) -> Result<Vec<PendingApproval>, StoreError> {
        let rows = approval_steps::Entity::find()
            .find_also_related(expenses::Entity)
            .filter(approval_steps::Column::ApproverId.eq(approver_id))
            .filter(approval_steps::Column::Status.eq(step_status_to_db(StepStatus::Pending)))
            .filter(expenses::Column::Status.eq(expense_status_to_db(ExpenseStatus::InReview)))
            .order_by_asc(approval_steps::Column::CreatedAt)
            .order_by_asc(approval_steps::Column::StepNumber)
            .all(&self.db)
            .await
            .map_err(store_err)?;

        Ok(rows
            .into_iter()
            .filter_map(|(step, expense)| {
                expense.map(|expense| PendingApproval {
                    step: step_from_row(step),
                    expense: expense_from_row(expense),
                })
            })
            .collect())
    }

    async fn expenses_for_employee(
        &self,
        employee_id: Uuid,
    ) -> Result<Vec<ExpenseWithSteps>, StoreError> {
        let rows = expenses::Entity::find()
            .filter(expenses::Column::EmployeeId.eq(employee_id))
            .order_by_desc(expenses::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(store_err)?;
        self.with_steps(rows).await
    }

    async fn expenses_for_company(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<ExpenseWithSteps>, StoreError> {
        let rows = expenses::Entity::find()
            .filter(expenses::Column::CompanyId.eq(company_id))
            .order_by_desc(expenses::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(store_err)?;
        self.with_steps(rows).await
    }

    async fn stalled_expenses(&self, company_id: Uuid) -> Result<Vec<Expense>, StoreError> {
        Ok(expenses::Entity::find()
            .filter(expenses::Column::CompanyId.eq(company_id))
            .filter(expenses::Column::Status.eq(expense_status_to_db(ExpenseStatus::Pending)))
            .order_by_asc(expenses::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(store_err)?
            .into_iter()
            .map(expense_from_row)
            .collect())
    }

    async fn escalate(&self, step: &ApprovalStep) -> Result<bool, StoreError> {
        let txn = self.db.begin().await.map_err(store_err)?;
        let moved = expenses::Entity::update_many()
            .set(expenses::ActiveModel {
                status: Set(expense_status_to_db(ExpenseStatus::InReview)),
                current_approver_step: Set(step.step_number),
                updated_at: Set(Utc::now().into()),
                ..Default::default()
            })
            .filter(expenses::Column::Id.eq(step.expense_id))
            .filter(expenses::Column::Status.eq(expense_status_to_db(ExpenseStatus::Pending)))
            .exec(&txn)
            .await
            .map_err(store_err)?;
        if moved.rows_affected == 0 {
            return Ok(false);
        }

        step_to_row(step).insert(&txn).await.map_err(store_err)?;
        txn.commit().await.map_err(store_err)?;
        Ok(true)
    }
}
