//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes for expenses, approvals and approval rules
//! - Company signup and user directory management
//! - Authentication middleware resolving the caller
//! - Error rendering

pub mod error;
pub mod middleware;
pub mod routes;

use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use outlay_core::directory::DirectoryService;
use outlay_core::expense::ExpenseService;
use outlay_core::store::DirectoryStore;
use outlay_shared::JwtService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Expense workflow service.
    pub service: Arc<ExpenseService>,
    /// Company and user management.
    pub users: Arc<DirectoryService>,
    /// Directory used to resolve the authenticated caller.
    pub directory: Arc<dyn DirectoryStore>,
    /// JWT service for token validation.
    pub jwt_service: Arc<JwtService>,
    /// Maximum accepted upload size, in bytes.
    pub max_upload_bytes: usize,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
