//! Authentication middleware for protected routes.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;
use uuid::Uuid;

use crate::{AppState, error::ApiError};
use outlay_core::expense::Caller;
use outlay_shared::{AppError, JwtError};

/// Extracts the bearer token from the Authorization header.
fn extract_bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
}

fn unauthorized(message: &str) -> ApiError {
    ApiError(AppError::Unauthorized(message.to_string()))
}

/// Authentication middleware that validates JWT tokens.
///
/// This middleware:
/// 1. Extracts the Bearer token from the Authorization header
/// 2. Validates the token using the JWT service
/// 3. Resolves the caller (role, company, manager) from the directory
/// 4. Stores the caller in request extensions for handlers to access
///
/// The directory is authoritative: a token whose company no longer matches
/// the user's is rejected.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(token) = auth_header.and_then(extract_bearer_token) else {
        return unauthorized("Authorization header with Bearer token is required")
            .into_response();
    };

    let claims = match state.jwt_service.validate_token(token) {
        Ok(claims) => claims,
        Err(JwtError::Expired) => return unauthorized("Token has expired").into_response(),
        Err(_) => return unauthorized("Invalid or malformed token").into_response(),
    };

    let caller = match state.directory.find_caller(claims.user_id()).await {
        Ok(Some(caller)) if caller.company_id == claims.company_id() => caller,
        Ok(_) => {
            warn!(user_id = %claims.user_id(), "Token for unknown user or company");
            return unauthorized("User is not a member of this company").into_response();
        }
        Err(e) => return ApiError(AppError::Database(e.to_string())).into_response(),
    };

    request.extensions_mut().insert(caller);
    next.run(request).await
}

/// Extractor for the authenticated caller.
///
/// ```ignore
/// async fn handler(auth: AuthUser) -> impl IntoResponse {
///     let user_id = auth.user_id();
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser(pub Caller);

impl AuthUser {
    /// Returns the user ID.
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.0.id
    }

    /// Returns the company ID.
    #[must_use]
    pub fn company_id(&self) -> Uuid {
        self.0.company_id
    }

    /// Returns the resolved caller.
    #[must_use]
    pub fn caller(&self) -> &Caller {
        &self.0
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| unauthorized("Authentication required"))
    }
}
