//! Company signup.
//!
//! Creates a company with its first admin and returns an access token for
//! that admin.

use axum::{
    Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};
use outlay_core::directory::{Registration, User};
use outlay_core::expense::Company;
use outlay_shared::AppError;

/// Creates the auth routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/auth/signup", post(signup))
}

/// Request body for signup.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    /// Company name.
    pub company_name: String,
    /// ISO 4217 reporting currency. Defaults to USD.
    pub currency: Option<String>,
    /// Admin email address.
    pub email: String,
    /// Admin display name.
    pub full_name: String,
}

/// Response for signup.
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    /// The new company.
    pub company: Company,
    /// Its admin.
    pub user: User,
    /// Bearer token for the admin.
    pub access_token: String,
    /// Token lifetime in seconds.
    pub expires_in: i64,
}

/// POST `/auth/signup` - Register a company and its admin.
async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (company, user) = state
        .users
        .register(Registration {
            company_name: payload.company_name,
            currency: payload.currency,
            email: payload.email,
            full_name: payload.full_name,
        })
        .await?;

    let access_token = state
        .jwt_service
        .generate_access_token(user.id, company.id, user.role.as_str())
        .map_err(|e| ApiError(AppError::Internal(e.to_string())))?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            company,
            user,
            access_token,
            expires_in: state.jwt_service.access_token_expires_in(),
        }),
    ))
}
