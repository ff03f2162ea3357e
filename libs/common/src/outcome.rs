//! Uniform handler outcome
//!
//! Handlers return `anyhow::Result<Option<Outcome<T>>>`: `Err` for unexpected
//! failures, `None` when the addressed entity does not exist, and an
//! [`Outcome`] for everything the handler expected.

use serde::{Deserialize, Serialize};

/// Tagged success/failure wrapper for expected handler results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome<T> {
    Success(T),
    Failure(String),
}

impl<T> Outcome<T> {
    pub fn success(value: T) -> Self {
        Outcome::Success(value)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Outcome::Failure(message.into())
    }

    /// Success when `persisted` is true, otherwise a failure with `message`
    pub fn from_persisted(persisted: bool, value: T, message: &str) -> Self {
        if persisted {
            Outcome::Success(value)
        } else {
            Outcome::Failure(message.to_string())
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Failure(error) => Outcome::Failure(error),
        }
    }

    pub fn into_result(self) -> Result<T, String> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(error) => Err(error),
        }
    }
}
