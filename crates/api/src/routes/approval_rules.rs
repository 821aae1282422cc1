//! Approval rule management routes.
//!
//! Admins manage rules; admins and managers may read them.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::AuthUser};
use outlay_core::approval::{RuleDraft, RuleUpdate, StepDraft};

/// Creates the approval rules routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/approval-rules",
            get(list_approval_rules).post(create_approval_rule),
        )
        .route(
            "/approval-rules/{rule_id}",
            get(get_approval_rule)
                .patch(update_approval_rule)
                .delete(delete_approval_rule),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// A step in a rule request.
#[derive(Debug, Deserialize)]
pub struct StepRequest {
    /// Who approves at this step.
    pub approver_id: Uuid,
    /// Position in the rule, 1 or greater.
    pub step_number: i32,
    /// Defaults to true.
    pub is_required: Option<bool>,
}

impl From<StepRequest> for StepDraft {
    fn from(req: StepRequest) -> Self {
        Self {
            approver_id: req.approver_id,
            step_number: req.step_number,
            is_required: req.is_required.unwrap_or(true),
        }
    }
}

/// Request body for creating an approval rule.
#[derive(Debug, Deserialize)]
pub struct CreateApprovalRuleRequest {
    /// Name of the approval rule.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// `sequential`, `percentage`, `specific_approver` or `hybrid`.
    pub rule_type: String,
    /// Required for `percentage` and `hybrid`.
    pub percentage_required: Option<i32>,
    /// Required for `specific_approver` and `hybrid`.
    pub specific_approver_id: Option<Uuid>,
    /// Defaults to true.
    pub is_manager_approver: Option<bool>,
    /// Defaults to 0; higher wins.
    pub priority: Option<i32>,
    /// Ordered approvers.
    #[serde(default)]
    pub steps: Vec<StepRequest>,
}

/// Request body for updating an approval rule.
#[derive(Debug, Deserialize)]
pub struct UpdateApprovalRuleRequest {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// Activate or deactivate.
    pub is_active: Option<bool>,
    /// New priority.
    pub priority: Option<i32>,
    /// New manager-first flag.
    pub is_manager_approver: Option<bool>,
    /// Replaces every step when present.
    pub steps: Option<Vec<StepRequest>>,
}

fn require_admin(auth: &AuthUser) -> Result<(), ApiError> {
    if auth.caller().is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only admins can manage approval rules"))
    }
}

fn require_reader(auth: &AuthUser) -> Result<(), ApiError> {
    if auth.caller().can_view_company_expenses() {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "Only admins and managers can view approval rules",
        ))
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/approval-rules` - List the company's rules.
async fn list_approval_rules(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    require_reader(&auth)?;
    let rules = state.service.list_rules(auth.company_id()).await?;
    Ok(Json(json!({ "data": rules })))
}

/// POST `/approval-rules` - Create a rule.
async fn create_approval_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateApprovalRuleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&auth)?;

    let draft = RuleDraft {
        name: payload.name,
        description: payload.description,
        rule_type: payload.rule_type,
        percentage_required: payload.percentage_required,
        specific_approver_id: payload.specific_approver_id,
        is_manager_approver: payload.is_manager_approver,
        priority: payload.priority,
        steps: payload.steps.into_iter().map(StepDraft::from).collect(),
    };
    let rule = state.service.create_rule(auth.company_id(), draft).await?;

    Ok((StatusCode::CREATED, Json(rule)))
}

/// GET `/approval-rules/{rule_id}` - Get a rule.
async fn get_approval_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(rule_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    require_reader(&auth)?;
    let rule = state.service.get_rule(auth.company_id(), rule_id).await?;
    Ok(Json(rule))
}

/// PATCH `/approval-rules/{rule_id}` - Update a rule.
async fn update_approval_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(rule_id): Path<Uuid>,
    Json(payload): Json<UpdateApprovalRuleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&auth)?;

    let update = RuleUpdate {
        name: payload.name,
        description: payload.description,
        is_active: payload.is_active,
        priority: payload.priority,
        is_manager_approver: payload.is_manager_approver,
        steps: payload
            .steps
            .map(|steps| steps.into_iter().map(StepDraft::from).collect()),
    };
    let rule = state
        .service
        .update_rule(auth.company_id(), rule_id, update)
        .await?;
    Ok(Json(rule))
}

/// DELETE `/approval-rules/{rule_id}` - Delete a rule and its steps.
async fn delete_approval_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(rule_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&auth)?;
    state.service.delete_rule(auth.company_id(), rule_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
