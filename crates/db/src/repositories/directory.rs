//! Directory repository: companies and users.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use outlay_core::directory::User;
use outlay_core::expense::{Caller, Company};
use outlay_core::store::{DirectoryStore, StoreError};

use super::mapping::{
    caller_from_row, company_from_row, company_to_row, role_to_db, store_err, user_from_row,
    user_to_row,
};
use crate::entities::{companies, users};

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Repository for companies and users.
#[derive(Debug, Clone)]
pub struct DirectoryRepository {
    db: DatabaseConnection,
}

impl DirectoryRepository {
    /// Creates a new directory repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DirectoryStore for DirectoryRepository {
    async fn find_caller(&self, user_id: Uuid) -> Result<Option<Caller>, StoreError> {
        Ok(users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await
            .map_err(store_err)?
            .map(caller_from_row))
    }

    async fn find_company(&self, company_id: Uuid) -> Result<Option<Company>, StoreError> {
        Ok(companies::Entity::find_by_id(company_id)
            .one(&self.db)
            .await
            .map_err(store_err)?
            .map(company_from_row))
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await
            .map_err(store_err)?
            .map(user_from_row))
    }

    async fn list_users(&self, company_id: Uuid) -> Result<Vec<User>, StoreError> {
        Ok(users::Entity::find()
            .filter(users::Column::CompanyId.eq(company_id))
            .order_by_asc(users::Column::FullName)
            .order_by_asc(users::Column::Email)
            .all(&self.db)
            .await
            .map_err(store_err)?
            .into_iter()
            .map(user_from_row)
            .collect())
    }

    async fn insert_user(&self, user: &User) -> Result<bool, StoreError> {
        match user_to_row(user).insert(&self.db).await {
            Ok(_) => Ok(true),
            Err(e) if is_unique_violation(&e) => {
                debug!(email = %user.email, "Email already registered");
                Ok(false)
            }
            Err(e) => Err(store_err(e)),
        }
    }

    async fn update_user(&self, user: &User) -> Result<bool, StoreError> {
        let result = users::Entity::update_many()
            .set(users::ActiveModel {
                role: Set(role_to_db(user.role)),
                manager_id: Set(user.manager_id),
                updated_at: Set(user.updated_at.into()),
                ..Default::default()
            })
            .filter(users::Column::Id.eq(user.id))
            .filter(users::Column::CompanyId.eq(user.company_id))
            .exec(&self.db)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected > 0)
    }

    async fn register_company(&self, company: &Company, admin: &User) -> Result<bool, StoreError> {
        let txn = self.db.begin().await.map_err(store_err)?;

        company_to_row(company, admin.created_at)
            .insert(&txn)
            .await
            .map_err(store_err)?;
        match user_to_row(admin).insert(&txn).await {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                txn.rollback().await.map_err(store_err)?;
                debug!(email = %admin.email, "Email already registered");
                return Ok(false);
            }
            Err(e) => return Err(store_err(e)),
        }

        txn.commit().await.map_err(store_err)?;
        Ok(true)
    }
}
