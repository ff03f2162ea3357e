//! Token issuance and validation
//!
//! Access tokens are HS512-signed JWTs carrying the user's id, username and
//! email. Refresh tokens are opaque random strings; only their SHA-256 hash
//! is ever stored.

use anyhow::Result;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

const MIN_SECRET_LEN: usize = 32;
const OPAQUE_TOKEN_LEN: usize = 64;

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Symmetric signing key
    pub secret: String,
    /// Access token expiration time in seconds (default: 15 minutes)
    pub access_token_expiry: u64,
    /// Refresh token expiration time in seconds (default: 7 days)
    pub refresh_token_expiry: u64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `TOKEN_KEY`: Signing key, at least 32 bytes
    /// - `JWT_ACCESS_TOKEN_EXPIRY`: Access token expiry in seconds (default: 900)
    /// - `JWT_REFRESH_TOKEN_EXPIRY`: Refresh token expiry in seconds (default: 604800)
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("TOKEN_KEY")
            .map_err(|_| anyhow::anyhow!("TOKEN_KEY environment variable not set"))?;

        let access_token_expiry = std::env::var("JWT_ACCESS_TOKEN_EXPIRY")
            .unwrap_or_else(|_| "900".to_string())
            .parse()
            .unwrap_or(900);

        let refresh_token_expiry = std::env::var("JWT_REFRESH_TOKEN_EXPIRY")
            .unwrap_or_else(|_| "604800".to_string())
            .parse()
            .unwrap_or(604800);

        Ok(JwtConfig {
            secret,
            access_token_expiry,
            refresh_token_expiry,
        })
    }
}

/// JWT claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// Username
    pub name: String,
    /// Email address
    pub email: String,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// The identity an access token is issued for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

/// A freshly minted opaque token and the hash to persist for it
#[derive(Debug, Clone)]
pub struct OpaqueToken {
    pub token: String,
    pub token_hash: String,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Result<Self> {
        if config.secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("TOKEN_KEY must be at least {} bytes long", MIN_SECRET_LEN);
        }

        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS512);
        validation.validate_exp = true;
        validation.leeway = 0;

        Ok(JwtService {
            encoding_key,
            decoding_key,
            validation,
            config,
        })
    }

    /// Generate an access token for a user
    pub fn generate_access_token(&self, subject: &TokenSubject) -> Result<String> {
        let now = unix_now()?;
        self.encode_claims(subject, now, now + self.config.access_token_expiry)
    }

    /// Generate an access token that outlives the one it replaces
    pub fn renew_access_token(&self, subject: &TokenSubject, previous: &Claims) -> Result<String> {
        let now = unix_now()?;
        let exp = (now + self.config.access_token_expiry).max(previous.exp + 1);
        self.encode_claims(subject, now, exp)
    }

    fn encode_claims(&self, subject: &TokenSubject, iat: u64, exp: u64) -> Result<String> {
        let claims = Claims {
            sub: subject.id,
            name: subject.username.clone(),
            email: subject.email.clone(),
            iat,
            exp,
        };

        let token = encode(&Header::new(Algorithm::HS512), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Validate a token and return the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    /// Generate an opaque refresh token
    pub fn generate_refresh_token(&self) -> OpaqueToken {
        generate_opaque_token()
    }

    /// Get the access token expiry time
    pub fn access_token_expiry(&self) -> u64 {
        self.config.access_token_expiry
    }

    /// Get the refresh token expiry time
    pub fn refresh_token_expiry(&self) -> u64 {
        self.config.refresh_token_expiry
    }
}

/// Random alphanumeric token, used for refresh and email verification
pub fn generate_opaque_token() -> OpaqueToken {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(OPAQUE_TOKEN_LEN)
        .map(char::from)
        .collect();
    let token_hash = hash_token(&token);

    OpaqueToken { token, token_hash }
}

/// Hex SHA-256 of an opaque token
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Read the `exp` claim without checking the signature.
///
/// Only for scheduling on the client side, never for authorization.
pub fn read_expiry(token: &str) -> Result<u64> {
    let mut validation = Validation::new(Algorithm::HS512);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;

    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(token_data.claims.exp)
}

pub fn unix_now() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| anyhow::anyhow!("Failed to get current time: {}", e))?
        .as_secs())
}
