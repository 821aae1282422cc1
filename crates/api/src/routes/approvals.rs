//! Approver inbox and decision routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::AuthUser};
use outlay_core::approval::Decision;

/// Creates the approval routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/approvals/pending", get(list_pending))
        .route("/approvals/{step_id}/decision", post(decide))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for deciding a step.
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    /// `approved` or `rejected`.
    pub decision: String,
    /// Optional comments; blank comments are dropped.
    pub comments: Option<String>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/approvals/pending` - Steps awaiting the caller on expenses still in review.
async fn list_pending(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let pending = state.service.pending_approvals(auth.caller()).await?;
    Ok(Json(json!({ "data": pending })))
}

/// POST `/approvals/{step_id}/decision` - Approve or reject a step.
async fn decide(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(step_id): Path<Uuid>,
    Json(payload): Json<DecisionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let decision = Decision::parse(payload.decision.trim()).ok_or_else(|| {
        ApiError::validation(format!(
            "decision must be 'approved' or 'rejected', got '{}'",
            payload.decision
        ))
    })?;

    let outcome = state
        .service
        .decide(auth.caller(), step_id, decision, payload.comments)
        .await?;
    Ok(Json(outcome))
}
