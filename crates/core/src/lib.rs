//! Core business logic for Outlay.
//!
//! This crate contains the approval engine and expense lifecycle with ZERO
//! web or database dependencies. Persistence sits behind the traits in
//! `store`; the Postgres implementation lives in `outlay-db`.
//!
//! # Modules
//!
//! - `approval` - Rules, selection, workflow instantiation and resolution
//! - `expense` - Expense types, lifecycle and the workflow service
//! - `currency` - Conversion into the company currency
//! - `directory` - Company registration and user management
//! - `extraction` - Expense extraction from uploaded documents
//! - `store` - Storage traits and the in-memory store

pub mod approval;
pub mod currency;
pub mod directory;
pub mod expense;
pub mod extraction;
pub mod store;
