//! Authentication service models

pub mod refresh_token;
pub mod user;

// Re-export for convenience
pub use refresh_token::{RefreshRejection, RefreshToken};
pub use user::{CreateUserOutcome, NewUser, User};
