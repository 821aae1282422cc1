//! Authentication claims carried by access tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims for access tokens.
///
/// Tokens are issued by the identity provider; this service only validates
/// them and resolves the caller's profile from the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: Uuid,
    /// Company the user belongs to.
    pub company: Uuid,
    /// User's role in the company (`admin`, `manager`, `employee`).
    pub role: String,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
}

impl Claims {
    /// Creates new claims for a user.
    #[must_use]
    pub fn new(user_id: Uuid, company_id: Uuid, role: &str, expires_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            company: company_id,
            role: role.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    /// Returns the user ID from claims.
    #[must_use]
    pub const fn user_id(&self) -> Uuid {
        self.sub
    }

    /// Returns the company ID from claims.
    #[must_use]
    pub const fn company_id(&self) -> Uuid {
        self.company
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_claims_new_sets_correct_fields() {
        let user_id = Uuid::new_v4();
        let company_id = Uuid::new_v4();
        let expires_at = Utc::now() + Duration::hours(1);
        let before = Utc::now().timestamp();

        let claims = Claims::new(user_id, company_id, "manager", expires_at);

        assert_eq!(claims.user_id(), user_id);
        assert_eq!(claims.company_id(), company_id);
        assert_eq!(claims.role, "manager");
        assert!(claims.iat >= before);
        assert_eq!(claims.exp, expires_at.timestamp());
    }

    #[test]
    fn test_claims_serialize_with_short_keys() {
        let claims = Claims::new(
            Uuid::nil(),
            Uuid::nil(),
            "employee",
            Utc::now() + Duration::minutes(5),
        );
        let value = serde_json::to_value(&claims).unwrap();

        assert!(value.get("sub").is_some());
        assert!(value.get("company").is_some());
        assert_eq!(value["role"], "employee");
    }
}
