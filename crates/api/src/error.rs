//! Error rendering for the HTTP API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use outlay_core::approval::WorkflowError;
use outlay_core::directory::DirectoryError;
use outlay_shared::AppError;

/// Handler error rendered as `{"error": <code>, "message": <text>}`.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl ApiError {
    /// 400 with a validation message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self(AppError::Validation(message.into()))
    }

    /// 403 with a message.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self(AppError::Forbidden(message.into()))
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        Self(err.into())
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }

        (
            status,
            Json(json!({
                "error": self.0.error_code(),
                "message": self.0.public_message(),
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use uuid::Uuid;

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_workflow_error_keeps_code() {
        let (status, body) = render(
            WorkflowError::AlreadyDecided {
                step_id: Uuid::nil(),
            }
            .into(),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "ALREADY_DECIDED");
    }

    #[tokio::test]
    async fn test_database_error_hides_details() {
        let (status, body) = render(AppError::Database("connection reset".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "An error occurred");
    }

    #[tokio::test]
    async fn test_directory_error_keeps_code() {
        let (status, body) = render(DirectoryError::EmailTaken("a@b.io".into()).into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "EMAIL_TAKEN");
    }

    #[tokio::test]
    async fn test_forbidden() {
        let (status, body) = render(ApiError::forbidden("admins only")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "FORBIDDEN");
    }
}
