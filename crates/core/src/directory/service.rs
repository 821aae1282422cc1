//! Directory service: company registration and user management.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::error::DirectoryError;
use super::types::{NewUser, Registration, User, UserUpdate};
use crate::expense::types::{Company, Role};
use crate::store::DirectoryStore;

/// User and company management over a `DirectoryStore`.
///
/// Callers gate these operations by role; the service enforces company
/// scoping and manager assignments.
#[derive(Clone)]
pub struct DirectoryService {
    directory: Arc<dyn DirectoryStore>,
}

impl DirectoryService {
    /// Creates a new directory service.
    #[must_use]
    pub fn new(directory: Arc<dyn DirectoryStore>) -> Self {
        Self { directory }
    }

    /// Creates a company with its first admin.
    ///
    /// # Errors
    ///
    /// * `Validation` for malformed input
    /// * `EmailTaken` if the admin's email is already registered
    pub async fn register(
        &self,
        registration: Registration,
    ) -> Result<(Company, User), DirectoryError> {
        let (company, admin) = registration.into_company()?;
        if !self.directory.register_company(&company, &admin).await? {
            return Err(DirectoryError::EmailTaken(admin.email));
        }

        info!(
            company_id = %company.id,
            admin_id = %admin.id,
            currency = %company.currency,
            "Company registered"
        );
        Ok((company, admin))
    }

    /// Adds a user to a company.
    ///
    /// # Errors
    ///
    /// * `Validation` for malformed input or a manager who is not a manager
    ///   of the company
    /// * `EmailTaken` if the email is already registered
    pub async fn create_user(
        &self,
        company_id: Uuid,
        input: NewUser,
    ) -> Result<User, DirectoryError> {
        let user = input.into_user(company_id)?;
        if let Some(manager_id) = user.manager_id {
            self.ensure_manager(company_id, manager_id).await?;
        }
        if !self.directory.insert_user(&user).await? {
            return Err(DirectoryError::EmailTaken(user.email));
        }

        info!(
            user_id = %user.id,
            %company_id,
            role = %user.role,
            manager_id = ?user.manager_id,
            "User created"
        );
        Ok(user)
    }

    /// Changes a user's role or manager.
    ///
    /// # Errors
    ///
    /// * `UserNotFound` if the user is not a member of the company
    /// * `Validation` for a self-assignment or a manager who is not a manager
    ///   of the company
    pub async fn update_user(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        update: UserUpdate,
    ) -> Result<User, DirectoryError> {
        let mut user = self.member(company_id, user_id).await?;
        let new_manager = update.manager_id.flatten();
        update.apply(&mut user)?;
        if let Some(manager_id) = new_manager {
            self.ensure_manager(company_id, manager_id).await?;
        }
        if !self.directory.update_user(&user).await? {
            return Err(DirectoryError::UserNotFound(user_id));
        }

        info!(
            %user_id,
            %company_id,
            role = %user.role,
            manager_id = ?user.manager_id,
            "User updated"
        );
        Ok(user)
    }

    /// Users of a company, ordered by name.
    pub async fn list_users(&self, company_id: Uuid) -> Result<Vec<User>, DirectoryError> {
        Ok(self.directory.list_users(company_id).await?)
    }

    /// Managers of a company, the candidates for manager assignment.
    pub async fn list_managers(&self, company_id: Uuid) -> Result<Vec<User>, DirectoryError> {
        let mut users = self.directory.list_users(company_id).await?;
        users.retain(|u| u.role == Role::Manager);
        Ok(users)
    }

    async fn member(&self, company_id: Uuid, user_id: Uuid) -> Result<User, DirectoryError> {
        self.directory
            .find_user(user_id)
            .await?
            .filter(|u| u.company_id == company_id)
            .ok_or(DirectoryError::UserNotFound(user_id))
    }

    async fn ensure_manager(&self, company_id: Uuid, manager_id: Uuid) -> Result<(), DirectoryError> {
        match self.directory.find_user(manager_id).await? {
            Some(manager) if manager.company_id == company_id && manager.role == Role::Manager => {
                Ok(())
            }
            _ => Err(DirectoryError::Validation(format!(
                "user {manager_id} is not a manager of this company"
            ))),
        }
    }
}
