//! Shared fixtures for route tests, backed by the in-memory store.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header::AUTHORIZATION},
    middleware::from_fn_with_state,
};
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{AppState, middleware::auth_middleware};
use outlay_core::currency::FixedRateConverter;
use outlay_core::directory::DirectoryService;
use outlay_core::expense::{Caller, Company, ExpenseService, Role};
use outlay_core::store::InMemoryStore;
use outlay_shared::{JwtConfig, JwtService};

pub(crate) struct TestApp {
    pub state: AppState,
    pub company_id: Uuid,
    pub admin: Caller,
    pub manager: Caller,
    pub employee: Caller,
    pub loner: Caller,
}

fn member(company_id: Uuid, role: Role, manager_id: Option<Uuid>) -> Caller {
    Caller {
        id: Uuid::new_v4(),
        company_id,
        role,
        manager_id,
    }
}

pub(crate) async fn test_app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let company_id = Uuid::new_v4();
    store
        .insert_company(Company {
            id: company_id,
            name: "Acme".to_string(),
            currency: "USD".to_string(),
        })
        .await;

    let admin = member(company_id, Role::Admin, None);
    let manager = member(company_id, Role::Manager, None);
    let employee = member(company_id, Role::Employee, Some(manager.id));
    let loner = member(company_id, Role::Employee, None);
    for caller in [&admin, &manager, &employee, &loner] {
        store.insert_caller(caller.clone()).await;
    }

    let converter = FixedRateConverter::new().with_rate("EUR", "USD", dec!(1.10));
    let service = ExpenseService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(converter),
    );

    let state = AppState {
        service: Arc::new(service),
        users: Arc::new(DirectoryService::new(store.clone())),
        directory: store,
        jwt_service: Arc::new(JwtService::new(JwtConfig {
            secret: "test-secret-key-for-route-tests".to_string(),
            access_token_expires_minutes: 15,
        })),
        max_upload_bytes: 1024 * 1024,
    };

    TestApp {
        state,
        company_id,
        admin,
        manager,
        employee,
        loner,
    }
}

pub(crate) fn token(state: &AppState, caller: &Caller) -> String {
    state
        .jwt_service
        .generate_access_token(caller.id, caller.company_id, caller.role.as_str())
        .unwrap()
}

pub(crate) fn app(state: &AppState, routes: Router<AppState>) -> Router {
    routes
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state.clone())
}

pub(crate) async fn send(
    app: Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
