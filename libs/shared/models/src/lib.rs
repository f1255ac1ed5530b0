pub mod auth;
pub mod error;

pub use auth::{Principal, Role, User};
pub use error::AppError;
