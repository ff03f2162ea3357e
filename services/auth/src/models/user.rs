//! User model and related functionality

use chrono::{DateTime, Utc};
use common::{jwt::TokenSubject, models::UserDto};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User entity, credentials included
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub email_confirmed: bool,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    #[serde(skip_serializing)]
    pub verification_token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn token_subject(&self) -> TokenSubject {
        TokenSubject {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }

    pub fn to_dto(&self, token: String) -> UserDto {
        UserDto {
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            image: self.image.clone(),
            token,
        }
    }

    /// Whether `token_hash` is the pending email verification token
    pub fn verification_matches(&self, token_hash: &str) -> bool {
        self.verification_token_hash.as_deref() == Some(token_hash)
    }
}

/// New user creation payload
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub password: String,
    pub verification_token_hash: String,
}

/// What happened when inserting a user
#[derive(Debug)]
pub enum CreateUserOutcome {
    Created(User),
    UsernameTaken,
    EmailTaken,
}
