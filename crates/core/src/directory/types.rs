//! Directory types: users, their inputs and company registration.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::error::DirectoryError;
use crate::currency::conversion::normalize_code;
use crate::expense::types::{Caller, Company, Role};

/// Reporting currency of a company registered without one.
pub const DEFAULT_COMPANY_CURRENCY: &str = "USD";

/// A member of a company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// User ID.
    pub id: Uuid,
    /// Company the user belongs to.
    pub company_id: Uuid,
    /// Unique, lower-cased email address.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Role within the company.
    pub role: Role,
    /// The user's manager, if any. Drives the manager approval step.
    pub manager_id: Option<Uuid>,
    /// Created at timestamp.
    pub created_at: DateTime<Utc>,
    /// Updated at timestamp.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The identity used for authorization.
    #[must_use]
    pub fn caller(&self) -> Caller {
        Caller {
            id: self.id,
            company_id: self.company_id,
            role: self.role,
            manager_id: self.manager_id,
        }
    }
}

fn normalize_email(email: &str) -> Result<String, DirectoryError> {
    let email = email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
        && !email.chars().any(char::is_whitespace);
    if valid {
        Ok(email)
    } else {
        Err(DirectoryError::Validation(format!(
            "invalid email address: {email}"
        )))
    }
}

fn required(value: &str, field: &str) -> Result<String, DirectoryError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DirectoryError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// Input for adding a user to the caller's company.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Email address.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Defaults to `Employee`.
    pub role: Option<Role>,
    /// Must be a manager of the same company.
    pub manager_id: Option<Uuid>,
}

impl NewUser {
    /// Validates the input and builds the user.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryError::Validation` for a malformed email or a blank
    /// name.
    pub fn into_user(self, company_id: Uuid) -> Result<User, DirectoryError> {
        let now = Utc::now();
        Ok(User {
            id: Uuid::new_v4(),
            company_id,
            email: normalize_email(&self.email)?,
            full_name: required(&self.full_name, "full_name")?,
            role: self.role.unwrap_or(Role::Employee),
            manager_id: self.manager_id,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update of a user's role and manager.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    /// New role.
    pub role: Option<Role>,
    /// `Some(None)` clears the manager.
    pub manager_id: Option<Option<Uuid>>,
}

impl UserUpdate {
    /// Applies the update.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryError::Validation` if the user would manage
    /// themselves.
    pub fn apply(self, user: &mut User) -> Result<(), DirectoryError> {
        if self.manager_id == Some(Some(user.id)) {
            return Err(DirectoryError::Validation(
                "a user cannot be their own manager".to_string(),
            ));
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(manager_id) = self.manager_id {
            user.manager_id = manager_id;
        }
        user.updated_at = Utc::now();
        Ok(())
    }
}

/// A new company with its first admin.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Company name.
    pub company_name: String,
    /// ISO 4217 reporting currency; defaults to USD.
    pub currency: Option<String>,
    /// Admin email address.
    pub email: String,
    /// Admin display name.
    pub full_name: String,
}

impl Registration {
    /// Validates the input and builds the company and its admin.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryError::Validation` for a blank name, a currency that
    /// is not three letters or a malformed email.
    pub fn into_company(self) -> Result<(Company, User), DirectoryError> {
        let currency = self
            .currency
            .as_deref()
            .map_or_else(|| DEFAULT_COMPANY_CURRENCY.to_string(), normalize_code);
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DirectoryError::Validation(format!(
                "invalid currency code: {currency}"
            )));
        }

        let company = Company {
            id: Uuid::new_v4(),
            name: required(&self.company_name, "company_name")?,
            currency,
        };
        let admin = NewUser {
            email: self.email,
            full_name: self.full_name,
            role: Some(Role::Admin),
            manager_id: None,
        }
        .into_user(company.id)?;

        Ok((company, admin))
    }
}
