//! Approval rule repository.
//!
//! Rules and their workflow steps are always written together in one
//! database transaction.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use outlay_core::approval::ApprovalRule;
use outlay_core::store::{RuleStore, StoreError};

use super::mapping::{rule_from_row, rule_to_row, store_err, workflow_steps_to_rows};
use crate::entities::{approval_rules, workflow_steps};

/// Repository for approval rules.
#[derive(Debug, Clone)]
pub struct RuleRepository {
    db: DatabaseConnection,
}

impl RuleRepository {
    /// Creates a new rule repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn with_steps(
        &self,
        rows: Vec<approval_rules::Model>,
    ) -> Result<Vec<ApprovalRule>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut steps: HashMap<Uuid, Vec<workflow_steps::Model>> = HashMap::new();
        for step in workflow_steps::Entity::find()
            .filter(workflow_steps::Column::RuleId.is_in(ids))
            .order_by_asc(workflow_steps::Column::StepNumber)
            .all(&self.db)
            .await
            .map_err(store_err)?
        {
            steps.entry(step.rule_id).or_default().push(step);
        }

        rows.into_iter()
            .map(|row| {
                let own = steps.remove(&row.id).unwrap_or_default();
                rule_from_row(row, own)
            })
            .collect()
    }
}

#[async_trait]
impl RuleStore for RuleRepository {
    async fn active_rules(&self, company_id: Uuid) -> Result<Vec<ApprovalRule>, StoreError> {
        let rows = approval_rules::Entity::find()
            .filter(approval_rules::Column::CompanyId.eq(company_id))
            .filter(approval_rules::Column::IsActive.eq(true))
            .order_by_desc(approval_rules::Column::Priority)
            .order_by_desc(approval_rules::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(store_err)?;
        self.with_steps(rows).await
    }

    async fn list_rules(&self, company_id: Uuid) -> Result<Vec<ApprovalRule>, StoreError> {
        let rows = approval_rules::Entity::find()
            .filter(approval_rules::Column::CompanyId.eq(company_id))
            .order_by_desc(approval_rules::Column::Priority)
            .order_by_desc(approval_rules::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(store_err)?;
        self.with_steps(rows).await
    }

    async fn find_rule(
        &self,
        company_id: Uuid,
        rule_id: Uuid,
    ) -> Result<Option<ApprovalRule>, StoreError> {
        let Some(row) = approval_rules::Entity::find_by_id(rule_id)
            .filter(approval_rules::Column::CompanyId.eq(company_id))
            .one(&self.db)
            .await
            .map_err(store_err)?
        else {
            return Ok(None);
        };
        Ok(self.with_steps(vec![row]).await?.pop())
    }

    async fn insert_rule(&self, rule: &ApprovalRule) -> Result<(), StoreError> {
        let txn = self.db.begin().await.map_err(store_err)?;

        rule_to_row(rule).insert(&txn).await.map_err(store_err)?;
        let steps = workflow_steps_to_rows(rule);
        if !steps.is_empty() {
            workflow_steps::Entity::insert_many(steps)
                .exec(&txn)
                .await
                .map_err(store_err)?;
        }

        txn.commit().await.map_err(store_err)?;
        debug!(rule_id = %rule.id, "Inserted approval rule");
        Ok(())
    }

    async fn update_rule(&self, rule: &ApprovalRule) -> Result<(), StoreError> {
        let txn = self.db.begin().await.map_err(store_err)?;

        rule_to_row(rule).update(&txn).await.map_err(store_err)?;
        workflow_steps::Entity::delete_many()
            .filter(workflow_steps::Column::RuleId.eq(rule.id))
            .exec(&txn)
            .await
            .map_err(store_err)?;
        let steps = workflow_steps_to_rows(rule);
        if !steps.is_empty() {
            workflow_steps::Entity::insert_many(steps)
                .exec(&txn)
                .await
                .map_err(store_err)?;
        }

        txn.commit().await.map_err(store_err)?;
        debug!(rule_id = %rule.id, "Updated approval rule");
        Ok(())
    }

    async fn delete_rule(&self, company_id: Uuid, rule_id: Uuid) -> Result<bool, StoreError> {
        // Workflow steps go with the rule (ON DELETE CASCADE).
        let result = approval_rules::Entity::delete_many()
            .filter(approval_rules::Column::Id.eq(rule_id))
            .filter(approval_rules::Column::CompanyId.eq(company_id))
            .exec(&self.db)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected > 0)
    }
}
