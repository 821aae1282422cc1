//! Company directory: registration, users and manager assignments.

pub mod error;
pub mod service;
pub mod types;

pub use error::DirectoryError;
pub use service::DirectoryService;
pub use types::{DEFAULT_COMPANY_CURRENCY, NewUser, Registration, User, UserUpdate};
