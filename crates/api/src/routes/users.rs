//! User directory routes.
//!
//! Admins manage the company's users and their managers. Admins and managers
//! may list the managers available for assignment.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use serde::{Deserialize, Deserializer};
use serde_json::json;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::AuthUser};
use outlay_core::directory::{NewUser, UserUpdate};
use outlay_core::expense::Role;

/// Creates the user routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/managers", get(list_managers))
        .route("/users/{user_id}", put(update_user))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for adding a user.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    /// Email address, unique across companies.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// `admin`, `manager` or `employee`. Defaults to `employee`.
    pub role: Option<String>,
    /// A manager of the same company.
    pub manager_id: Option<Uuid>,
}

/// Request body for updating a user.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    /// New role.
    pub role: Option<String>,
    /// New manager. An explicit `null` clears it.
    #[serde(default, deserialize_with = "present")]
    pub manager_id: Option<Option<Uuid>>,
}

/// Distinguishes an explicit `null` from an absent field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::deserialize(deserializer).map(Some)
}

fn parse_role(role: Option<&str>) -> Result<Option<Role>, ApiError> {
    role.map(|r| Role::parse(r).ok_or_else(|| ApiError::validation(format!("unknown role: {r}"))))
        .transpose()
}

fn require_admin(auth: &AuthUser) -> Result<(), ApiError> {
    if auth.caller().is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only admins can manage users"))
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/users` - List the company's users.
async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&auth)?;
    let users = state.users.list_users(auth.company_id()).await?;
    Ok(Json(json!({ "data": users })))
}

/// POST `/users` - Add a user to the company.
async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&auth)?;

    let input = NewUser {
        email: payload.email,
        full_name: payload.full_name,
        role: parse_role(payload.role.as_deref())?,
        manager_id: payload.manager_id,
    };
    let user = state.users.create_user(auth.company_id(), input).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// PUT `/users/{user_id}` - Change a user's role or manager.
async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&auth)?;

    let update = UserUpdate {
        role: parse_role(payload.role.as_deref())?,
        manager_id: payload.manager_id,
    };
    let user = state
        .users
        .update_user(auth.company_id(), user_id, update)
        .await?;

    Ok(Json(user))
}

/// GET `/users/managers` - List the company's managers.
async fn list_managers(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    if !auth.caller().can_view_company_expenses() {
        return Err(ApiError::forbidden(
            "Only admins and managers can list managers",
        ));
    }
    let managers = state.users.list_managers(auth.company_id()).await?;
    Ok(Json(json!({ "data": managers })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{app, send, test_app, token};
    use outlay_core::directory::Registration;

    #[tokio::test]
    async fn test_admin_adds_user_with_manager() {
        let t = test_app().await;
        let admin = token(&t.state, &t.admin);

        let (status, created) = send(
            app(&t.state, routes()),
            "POST",
            "/users",
            Some(&admin),
            Some(json!({
                "email": "Nina@Acme.io",
                "full_name": "Nina Park",
                "manager_id": t.manager.id
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["email"], "nina@acme.io");
        assert_eq!(created["role"], "employee");
        assert_eq!(created["manager_id"], t.manager.id.to_string());
        assert_eq!(created["company_id"], t.company_id.to_string());

        let (status, body) = send(app(&t.state, routes()), "GET", "/users", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_only_admins_manage_users() {
        let t = test_app().await;
        let manager = token(&t.state, &t.manager);
        let employee = token(&t.state, &t.employee);

        let (status, body) = send(
            app(&t.state, routes()),
            "POST",
            "/users",
            Some(&manager),
            Some(json!({ "email": "nina@acme.io", "full_name": "Nina" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "FORBIDDEN");

        let uri = format!("/users/{}", t.loner.id);
        let (status, _) = send(
            app(&t.state, routes()),
            "PUT",
            &uri,
            Some(&manager),
            Some(json!({ "manager_id": t.manager.id })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(app(&t.state, routes()), "GET", "/users", Some(&employee), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(app(&t.state, routes()), "GET", "/users/managers", Some(&employee), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let t = test_app().await;
        let admin = token(&t.state, &t.admin);
        let body = json!({ "email": "nina@acme.io", "full_name": "Nina" });

        let (status, _) = send(app(&t.state, routes()), "POST", "/users", Some(&admin), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            app(&t.state, routes()),
            "POST",
            "/users",
            Some(&admin),
            Some(json!({ "email": "NINA@acme.io", "full_name": "Nina Again" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "EMAIL_TAKEN");
    }

    #[tokio::test]
    async fn test_create_user_validates_role_and_manager() {
        let t = test_app().await;
        let admin = token(&t.state, &t.admin);

        let (status, body) = send(
            app(&t.state, routes()),
            "POST",
            "/users",
            Some(&admin),
            Some(json!({ "email": "nina@acme.io", "full_name": "Nina", "role": "owner" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "VALIDATION_ERROR");

        // Employees cannot be assigned as managers.
        let (status, body) = send(
            app(&t.state, routes()),
            "POST",
            "/users",
            Some(&admin),
            Some(json!({ "email": "nina@acme.io", "full_name": "Nina", "manager_id": t.loner.id })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_update_assigns_and_clears_manager() {
        let t = test_app().await;
        let admin = token(&t.state, &t.admin);
        let uri = format!("/users/{}", t.loner.id);

        let (status, body) = send(
            app(&t.state, routes()),
            "PUT",
            &uri,
            Some(&admin),
            Some(json!({ "manager_id": t.manager.id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["manager_id"], t.manager.id.to_string());
        assert_eq!(body["role"], "employee");

        // Omitting the field leaves the manager alone.
        let (status, body) = send(
            app(&t.state, routes()),
            "PUT",
            &uri,
            Some(&admin),
            Some(json!({ "role": "manager" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "manager");
        assert_eq!(body["manager_id"], t.manager.id.to_string());

        let (status, body) = send(
            app(&t.state, routes()),
            "PUT",
            &uri,
            Some(&admin),
            Some(json!({ "manager_id": null })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["manager_id"].is_null());

        let (status, body) = send(app(&t.state, routes()), "GET", "/users/managers", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_user_cannot_manage_themselves() {
        let t = test_app().await;
        let admin = token(&t.state, &t.admin);
        let uri = format!("/users/{}", t.manager.id);

        let (status, body) = send(
            app(&t.state, routes()),
            "PUT",
            &uri,
            Some(&admin),
            Some(json!({ "manager_id": t.manager.id })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_update_user_of_other_company_is_not_found() {
        let t = test_app().await;
        let (_, outsider) = t
            .state
            .users
            .register(Registration {
                company_name: "Globex".to_string(),
                currency: None,
                email: "hank@globex.io".to_string(),
                full_name: "Hank".to_string(),
            })
            .await
            .unwrap();

        let admin = token(&t.state, &t.admin);
        let uri = format!("/users/{}", outsider.id);
        let (status, body) = send(
            app(&t.state, routes()),
            "PUT",
            &uri,
            Some(&admin),
            Some(json!({ "role": "employee" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "USER_NOT_FOUND");

        // Nor can an outsider become one of our users' manager.
        let uri = format!("/users/{}", t.loner.id);
        let (status, _) = send(
            app(&t.state, routes()),
            "PUT",
            &uri,
            Some(&admin),
            Some(json!({ "manager_id": outsider.id })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_managers_list_for_managers() {
        let t = test_app().await;
        let manager = token(&t.state, &t.manager);

        let (status, body) = send(app(&t.state, routes()), "GET", "/users/managers", Some(&manager), None).await;
        assert_eq!(status, StatusCode::OK);
        let managers = body["data"].as_array().unwrap();
        assert_eq!(managers.len(), 1);
        assert_eq!(managers[0]["id"], t.manager.id.to_string());
    }
}
