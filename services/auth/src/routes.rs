//! Account service routes

use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use common::{
    database,
    error::ValidationErrors,
    jwt::{Claims, generate_opaque_token, hash_token},
    models::{LoginRequest, RegisterRequest, UserDto},
    validation::validate_registration,
};
use cookie::{Cookie, SameSite, time::Duration};
use serde::Deserialize;
use std::any::Any;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::{
    AppState,
    error::{AuthError, internal_error_response},
    middleware::auth_middleware,
    models::{CreateUserOutcome, NewUser, User},
    session::Session,
};

pub const REFRESH_COOKIE: &str = "refreshToken";

#[derive(Debug, Deserialize)]
pub struct VerifyEmailParams {
    pub token: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendParams {
    pub email: String,
}

/// Create the router for the account service
pub fn create_router(state: AppState, cors: CorsLayer) -> Router {
    let authenticated = Router::new()
        .route("/", get(current_user))
        .route("/refreshToken", post(refresh_token))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let account = Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/verifyEmail", post(verify_email))
        .route("/resendEmailConfirmationLink", get(resend_email_confirmation_link))
        .merge(authenticated);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/account", account)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Response {
    match database::health_check(&state.db_pool).await {
        Ok(true) => Json(serde_json::json!({
            "status": "ok",
            "service": "auth-service"
        }))
        .into_response(),
        Ok(false) => internal_error_response(),
        Err(e) => {
            error!("Health check failed: {}", e);
            internal_error_response()
        }
    }
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<UserDto>), AuthError> {
    info!("Login attempt for: {}", payload.email);

    let user = state
        .users
        .find_by_email(&payload.email)
        .await?
        .ok_or_else(|| AuthError::unauthorized("Invalid email"))?;

    if !user.email_confirmed {
        return Err(AuthError::unauthorized("Email not confirmed"));
    }

    if !state.users.verify_password(&user, &payload.password)? {
        return Err(AuthError::unauthorized("Invalid password"));
    }

    let session = state.sessions.start_session(&user).await?;
    Ok(with_refresh_cookie(jar, session, &state))
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> Result<(CookieJar, Json<UserDto>), AuthError> {
    validate_registration(&payload)?;

    let mut errors = ValidationErrors::new();
    if state.users.username_exists(&payload.username).await? {
        errors.add("username", "Username taken");
    }
    if state.users.email_exists(&payload.email).await? {
        errors.add("email", "Email taken");
    }
    errors.into_result()?;

    let verification = generate_opaque_token();
    let new_user = NewUser {
        username: payload.username,
        display_name: payload.display_name,
        email: payload.email,
        password: payload.password,
        verification_token_hash: verification.token_hash,
    };

    let user = match state.users.create(&new_user).await? {
        CreateUserOutcome::Created(user) => user,
        CreateUserOutcome::UsernameTaken => {
            return Err(ValidationErrors::single("username", "Username taken").into());
        }
        CreateUserOutcome::EmailTaken => {
            return Err(ValidationErrors::single("email", "Email taken").into());
        }
    };
    info!("Registered user: {}", user.username);

    state
        .mailer
        .send_verification(&user.email, &verification.token)
        .await?;

    let session = state.sessions.start_session(&user).await?;
    Ok(with_refresh_cookie(jar, session, &state))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Query(params): Query<VerifyEmailParams>,
) -> Result<&'static str, AuthError> {
    let user = find_for_verification(&state, &params.email).await?;

    if !user.verification_matches(&hash_token(&params.token)) {
        return Err(AuthError::BadRequest(
            "Could not verify email address".to_string(),
        ));
    }

    state.users.confirm_email(user.id).await?;
    info!("Email confirmed for user: {}", user.username);

    Ok("Email confirmed - you can now login")
}

pub async fn resend_email_confirmation_link(
    State(state): State<AppState>,
    Query(params): Query<ResendParams>,
) -> Result<&'static str, AuthError> {
    let user = state
        .users
        .find_by_email(&params.email)
        .await?
        .ok_or_else(|| AuthError::unauthorized("Unauthorized"))?;

    let verification = generate_opaque_token();
    state
        .users
        .set_verification_token(user.id, &verification.token_hash)
        .await?;
    state
        .mailer
        .send_verification(&user.email, &verification.token)
        .await?;

    Ok("Email verification link resent")
}

pub async fn current_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<UserDto>), AuthError> {
    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| AuthError::unauthorized("Unauthorized"))?;

    let session = state.sessions.start_session(&user).await?;
    Ok(with_refresh_cookie(jar, session, &state))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<UserDto>), AuthError> {
    let presented = jar
        .get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AuthError::unauthorized("Unauthorized"))?;

    let session = state
        .sessions
        .refresh_session(&claims, &presented)
        .await?
        .ok_or_else(|| AuthError::unauthorized("Unauthorized"))?;

    Ok(with_refresh_cookie(jar, session, &state))
}

async fn find_for_verification(state: &AppState, email: &str) -> Result<User, AuthError> {
    state
        .users
        .find_by_email(email)
        .await?
        .ok_or_else(|| AuthError::BadRequest("Could not verify email address".to_string()))
}

fn with_refresh_cookie(
    jar: CookieJar,
    session: Session,
    state: &AppState,
) -> (CookieJar, Json<UserDto>) {
    let max_age = state.sessions.jwt_service().refresh_token_expiry() as i64;
    (
        jar.add(refresh_cookie(session.refresh_token, max_age)),
        Json(session.user),
    )
}

pub fn refresh_cookie(token: String, max_age_secs: i64) -> Cookie<'static> {
    let mut cookie = Cookie::new(REFRESH_COOKIE, token);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(Duration::seconds(max_age_secs));
    cookie
}

fn handle_panic(_: Box<dyn Any + Send + 'static>) -> Response {
    error!("Request handler panicked");
    internal_error_response()
}
