//! Authentication middleware for JWT token validation

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use common::jwt::Claims;
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Authentication middleware
///
/// Puts the validated `Claims` into the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let claims = state.jwt_service.validate_token(token).map_err(|e| {
        debug!("Rejected access token: {}", e);
        ApiError::Unauthorized
    })?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Host-only policy for editing and deleting an activity
pub async fn ensure_host(state: &AppState, activity_id: Uuid, claims: &Claims) -> ApiResult<()> {
    match state.activities.host_of(activity_id).await? {
        None => Err(ApiError::NotFound),
        Some(host) if host == claims.sub => Ok(()),
        Some(_) => Err(ApiError::Forbidden),
    }
}
