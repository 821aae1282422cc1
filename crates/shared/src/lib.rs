//! Shared errors, configuration, and auth tokens for Outlay.
//!
//! This crate provides common types used across all other crates:
//! - Application-wide error types
//! - Configuration management
//! - JWT claims and token handling

pub mod auth;
pub mod config;
pub mod error;
pub mod jwt;

pub use auth::Claims;
pub use config::{
    AppConfig, CurrencySettings, DatabaseConfig, ExtractionSettings, JwtSettings, ServerConfig,
    WorkflowSettings,
};
pub use error::{AppError, AppResult};
pub use jwt::{JwtConfig, JwtError, JwtService};
