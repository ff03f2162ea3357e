//! Refresh token model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Refresh token record; revoked tokens are kept as an audit trail
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Why a presented refresh token cannot be exchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshRejection {
    Unknown,
    WrongOwner,
    Revoked,
    Expired,
}

impl RefreshToken {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Check that this token may be exchanged by `user_id` at `now`
    pub fn check_exchangeable(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<(), RefreshRejection> {
        if self.user_id != user_id {
            return Err(RefreshRejection::WrongOwner);
        }
        if self.is_revoked() {
            return Err(RefreshRejection::Revoked);
        }
        if self.is_expired(now) {
            return Err(RefreshRejection::Expired);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(user_id: Uuid, expires_in: Duration) -> RefreshToken {
        let now = Utc::now();
        RefreshToken {
            id: Uuid::new_v4(),
            user_id,
            token_hash: "hash".to_string(),
            created_at: now,
            expires_at: now + expires_in,
            revoked_at: None,
        }
    }

    #[test]
    fn fresh_token_is_exchangeable_by_owner() {
        let owner = Uuid::new_v4();
        let token = token(owner, Duration::days(7));

        assert_eq!(token.check_exchangeable(owner, Utc::now()), Ok(()));
        assert_eq!(
            token.check_exchangeable(Uuid::new_v4(), Utc::now()),
            Err(RefreshRejection::WrongOwner)
        );
    }

    #[test]
    fn revoked_token_is_rejected() {
        let owner = Uuid::new_v4();
        let mut token = token(owner, Duration::days(7));
        token.revoked_at = Some(Utc::now());

        assert!(token.is_revoked());
        assert_eq!(
            token.check_exchangeable(owner, Utc::now()),
            Err(RefreshRejection::Revoked)
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let owner = Uuid::new_v4();
        let token = token(owner, Duration::seconds(-1));

        assert_eq!(
            token.check_exchangeable(owner, Utc::now()),
            Err(RefreshRejection::Expired)
        );
    }
}
