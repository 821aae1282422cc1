//! `SeaORM` Entity for expenses table.

use super::sea_orm_active_enums::{ExpenseSource, ExpenseStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub employee_id: Uuid,
    pub company_id: Uuid,
    pub rule_id: Option<Uuid>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount: Decimal,
    pub currency: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub converted_amount: Decimal,
    pub category: String,
    pub description: String,
    pub expense_date: Date,
    pub merchant_name: Option<String>,
    pub expense_type: Option<String>,
    pub receipt_filename: Option<String>,
    pub source: ExpenseSource,
    pub status: ExpenseStatus,
    pub current_approver_step: i32,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::EmployeeId",
        to = "super::users::Column::Id"
    )]
    Users,
    #[sea_orm(
        belongs_to = "super::approval_rules::Entity",
        from = "Column::RuleId",
        to = "super::approval_rules::Column::Id",
        on_delete = "SetNull"
    )]
    ApprovalRules,
    #[sea_orm(has_many = "super::approval_steps::Entity")]
    ApprovalSteps,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::approval_rules::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApprovalRules.def()
    }
}

impl Related<super::approval_steps::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApprovalSteps.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
