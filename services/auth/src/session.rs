//! Session management: access tokens plus rotating refresh tokens

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use common::{
    jwt::{Claims, JwtService},
    models::UserDto,
};
use tracing::{info, warn};

use crate::{
    models::{RefreshRejection, User},
    repositories::{RefreshTokenRepository, UserRepository},
};

/// An issued session: the user payload and the raw refresh token for the cookie
#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserDto,
    pub refresh_token: String,
}

/// Session manager for issuing and rotating user sessions
#[derive(Clone)]
pub struct SessionManager {
    jwt_service: JwtService,
    users: UserRepository,
    refresh_tokens: RefreshTokenRepository,
}

impl SessionManager {
    pub fn new(
        jwt_service: JwtService,
        users: UserRepository,
        refresh_tokens: RefreshTokenRepository,
    ) -> Self {
        Self {
            jwt_service,
            users,
            refresh_tokens,
        }
    }

    pub fn jwt_service(&self) -> &JwtService {
        &self.jwt_service
    }

    /// Create a new session for a user
    pub async fn start_session(&self, user: &User) -> Result<Session> {
        info!("Creating session for user: {}", user.id);

        let access_token = self.jwt_service.generate_access_token(&user.token_subject())?;
        let refresh = self.jwt_service.generate_refresh_token();
        self.refresh_tokens
            .insert(user.id, &refresh.token_hash, self.refresh_expiry_from(Utc::now()))
            .await?;

        Ok(Session {
            user: user.to_dto(access_token),
            refresh_token: refresh.token,
        })
    }

    /// Exchange a refresh token for a new session.
    ///
    /// `None` when the presented token cannot be exchanged by the bearer of
    /// `claims`.
    pub async fn refresh_session(&self, claims: &Claims, presented: &str) -> Result<Option<Session>> {
        let now = Utc::now();
        let token_hash = common::jwt::hash_token(presented);

        let stored = match self.refresh_tokens.find_by_hash(&token_hash).await? {
            Some(stored) => stored,
            None => {
                reject(claims, RefreshRejection::Unknown);
                return Ok(None);
            }
        };

        if let Err(rejection) = stored.check_exchangeable(claims.sub, now) {
            reject(claims, rejection);
            return Ok(None);
        }

        let Some(user) = self.users.find_by_id(claims.sub).await? else {
            reject(claims, RefreshRejection::Unknown);
            return Ok(None);
        };

        let refresh = self.jwt_service.generate_refresh_token();
        if !self
            .refresh_tokens
            .rotate(&stored, &refresh.token_hash, self.refresh_expiry_from(now))
            .await?
        {
            reject(claims, RefreshRejection::Revoked);
            return Ok(None);
        }

        let access_token = self
            .jwt_service
            .renew_access_token(&user.token_subject(), claims)?;

        Ok(Some(Session {
            user: user.to_dto(access_token),
            refresh_token: refresh.token,
        }))
    }

    fn refresh_expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::seconds(self.jwt_service.refresh_token_expiry() as i64)
    }
}

fn reject(claims: &Claims, rejection: RefreshRejection) {
    warn!("Refresh rejected for user {}: {:?}", claims.sub, rejection);
}
