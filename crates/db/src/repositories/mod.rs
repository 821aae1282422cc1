//! Repository implementations of the core storage traits.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod directory;
pub mod expense;
mod mapping;
pub mod rule;

pub use directory::DirectoryRepository;
pub use expense::ExpenseRepository;
pub use rule::RuleRepository;
