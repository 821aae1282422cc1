//! Expense submission and listing routes.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::AuthUser};
use outlay_core::expense::NewExpense;
use outlay_core::extraction::Document;

/// Creates the expense routes.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/expenses", post(submit_expense).get(list_company_expenses))
        .route(
            "/expenses/upload",
            post(upload_document).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/expenses/mine", get(list_my_expenses))
        .route("/expenses/stalled", get(list_stalled_expenses))
        .route("/expenses/{expense_id}/escalate", post(escalate_expense))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for submitting an expense.
#[derive(Debug, Deserialize)]
pub struct SubmitExpenseRequest {
    /// Amount as a decimal string.
    pub amount: String,
    /// ISO 4217 code.
    pub currency: String,
    /// Category.
    pub category: String,
    /// Description.
    pub description: String,
    /// Defaults to today.
    pub expense_date: Option<NaiveDate>,
    /// Merchant, if known.
    pub merchant_name: Option<String>,
    /// Free-form type.
    pub expense_type: Option<String>,
}

/// Request body for escalating a stalled expense.
#[derive(Debug, Deserialize)]
pub struct EscalateRequest {
    /// Approver who receives the expense.
    pub approver_id: Uuid,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/expenses` - Submit an expense.
async fn submit_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<SubmitExpenseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let amount = Decimal::from_str(payload.amount.trim())
        .map_err(|_| ApiError::validation(format!("invalid amount: {}", payload.amount)))?;

    let submitted = state
        .service
        .submit_expense(
            auth.caller(),
            NewExpense {
                amount,
                currency: payload.currency,
                category: payload.category,
                description: payload.description,
                expense_date: payload.expense_date,
                merchant_name: payload.merchant_name,
                expense_type: payload.expense_type,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(submitted)))
}

/// POST `/expenses/upload` - Submit every expense found in a document.
///
/// Expects a multipart body with a `file` field.
async fn upload_document(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut document = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation(format!("failed to read upload: {e}")))?;
        document = Some(Document::new(filename, bytes.to_vec())?);
        break;
    }
    let document = document.ok_or_else(|| ApiError::validation("file field is required"))?;

    info!(
        user_id = %auth.user_id(),
        filename = document.filename(),
        kind = %document.kind(),
        "Document uploaded"
    );
    let submitted = state.service.submit_document(auth.caller(), document).await?;

    Ok((StatusCode::CREATED, Json(json!({ "data": submitted }))))
}

/// GET `/expenses/mine` - The caller's expenses, newest first.
async fn list_my_expenses(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let expenses = state.service.my_expenses(auth.caller()).await?;
    Ok(Json(json!({ "data": expenses })))
}

/// GET `/expenses` - Every expense of the company (admins and managers).
async fn list_company_expenses(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    if !auth.caller().can_view_company_expenses() {
        return Err(ApiError::forbidden(
            "Only admins and managers can list company expenses",
        ));
    }
    let expenses = state.service.company_expenses(auth.company_id()).await?;
    Ok(Json(json!({ "data": expenses })))
}

/// GET `/expenses/stalled` - Expenses held without an approver (admins).
async fn list_stalled_expenses(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    if !auth.caller().is_admin() {
        return Err(ApiError::forbidden("Only admins can list stalled expenses"));
    }
    let expenses = state.service.stalled_expenses(auth.company_id()).await?;
    Ok(Json(json!({ "data": expenses })))
}

/// POST `/expenses/{expense_id}/escalate` - Route a stalled expense (admins).
async fn escalate_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(expense_id): Path<Uuid>,
    Json(payload): Json<EscalateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !auth.caller().is_admin() {
        return Err(ApiError::forbidden("Only admins can escalate expenses"));
    }
    let escalated = state
        .service
        .escalate_stalled(auth.company_id(), expense_id, payload.approver_id)
        .await?;
    Ok(Json(escalated))
}
