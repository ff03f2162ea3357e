//! Middleware for JWT token validation and authentication

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::{AppState, error::AuthError};

/// Bearer token from the Authorization header, if well formed
pub fn bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}

/// Validate the bearer token and put its `Claims` into request extensions
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(&req).ok_or_else(|| AuthError::unauthorized("Unauthorized"))?;

    let claims = state.sessions.jwt_service().validate_token(token).map_err(|e| {
        debug!("Rejected access token: {}", e);
        AuthError::unauthorized("Unauthorized")
    })?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
