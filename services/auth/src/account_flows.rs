//! Account flows against a live PostgreSQL
//!
//! Run with `DATABASE_URL` pointing at a scratch database:
//! `cargo test -p auth account_flows -- --ignored`

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use common::{
    database::{DatabaseConfig, init_pool, run_migrations},
    jwt::{JwtConfig, JwtService, hash_token, read_expiry},
};
use cookie::Cookie;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    AppState,
    config::ServiceConfig,
    email::{EmailConfig, EmailSender},
    repositories::{RefreshTokenRepository, UserRepository},
    routes::{REFRESH_COOKIE, create_router},
    session::SessionManager,
};

const PASSWORD: &str = "Pa$$w0rd";

struct Harness {
    app: Router,
    pool: PgPool,
    users: UserRepository,
}

async fn harness() -> Harness {
    let config = DatabaseConfig::from_env().unwrap();
    let pool = init_pool(&config).await.unwrap();
    run_migrations(&pool).await.unwrap();

    let jwt_service = JwtService::new(JwtConfig {
        secret: "account-flow-signing-key-long-enough-for-hs512".to_string(),
        access_token_expiry: 900,
        refresh_token_expiry: 604800,
    })
    .unwrap();
    let users = UserRepository::new(pool.clone());
    let sessions = SessionManager::new(
        jwt_service,
        users.clone(),
        RefreshTokenRepository::new(pool.clone()),
    );
    let mailer = EmailSender::new(&EmailConfig {
        client_app_url: "http://localhost:3000".to_string(),
    })
    .unwrap();
    let service = ServiceConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        client_origin: "http://localhost:3000".to_string(),
    };

    let app = create_router(
        AppState {
            db_pool: pool.clone(),
            sessions,
            users: users.clone(),
            mailer,
        },
        service.cors_layer().unwrap(),
    );

    Harness { app, pool, users }
}

/// A username and email nobody has used yet
fn fresh_identity() -> (String, String) {
    let suffix = Uuid::new_v4().simple().to_string();
    (format!("user_{}", &suffix[..12]), format!("{suffix}@test.com"))
}

fn registration(username: &str, email: &str) -> serde_json::Value {
    serde_json::json!({
        "displayName": "Test User",
        "email": email,
        "password": PASSWORD,
        "username": username
    })
}

async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response {
    app.clone()
        .oneshot(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn login(app: &Router, email: &str, password: &str) -> Response {
    post_json(
        app,
        "/api/account/login",
        serde_json::json!({ "email": email, "password": password }),
    )
    .await
}

async fn refresh(app: &Router, access_token: &str, refresh_token: &str) -> Response {
    app.clone()
        .oneshot(
            Request::post("/api/account/refreshToken")
                .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
                .header(header::COOKIE, format!("{REFRESH_COOKIE}={refresh_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

fn refresh_cookie_of(response: &Response) -> String {
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("response sets the refresh cookie")
        .to_str()
        .unwrap();
    let cookie = Cookie::parse(set_cookie).unwrap();
    assert_eq!(cookie.name(), REFRESH_COOKIE);
    cookie.value().to_string()
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Register and confirm a user, returning their email
async fn confirmed_user(harness: &Harness) -> String {
    let (username, email) = fresh_identity();
    let response = post_json(
        &harness.app,
        "/api/account/register",
        registration(&username, &email),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let user = harness.users.find_by_email(&email).await.unwrap().unwrap();
    assert!(harness.users.confirm_email(user.id).await.unwrap());
    email
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn registering_a_used_email_is_a_validation_error() {
    let harness = harness().await;
    let (username, email) = fresh_identity();
    let (other_username, _) = fresh_identity();

    let first = post_json(
        &harness.app,
        "/api/account/register",
        registration(&username, &email),
    )
    .await;
    assert_eq!(first.status(), StatusCode::OK);
    assert!(!refresh_cookie_of(&first).is_empty());

    let second = post_json(
        &harness.app,
        "/api/account/register",
        registration(&other_username, &email.to_uppercase()),
    )
    .await;

    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    let json = body_json(second).await;
    assert_eq!(json["errors"]["email"][0], "Email taken");
    assert!(json["errors"].get("username").is_none());
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn usernames_differing_only_in_case_collide() {
    let harness = harness().await;
    let (username, email) = fresh_identity();
    let (_, other_email) = fresh_identity();

    let first = post_json(
        &harness.app,
        "/api/account/register",
        registration(&username, &email),
    )
    .await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = post_json(
        &harness.app,
        "/api/account/register",
        registration(&username.to_uppercase(), &other_email),
    )
    .await;

    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    let json = body_json(second).await;
    assert_eq!(json["errors"]["username"][0], "Username taken");
    assert!(harness.users.username_exists(&username.to_uppercase()).await.unwrap());
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn login_explains_each_rejection() {
    let harness = harness().await;

    let (_, unknown) = fresh_identity();
    let response = login(&harness.app, &unknown, PASSWORD).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid email");

    let (username, email) = fresh_identity();
    let registered = post_json(
        &harness.app,
        "/api/account/register",
        registration(&username, &email),
    )
    .await;
    assert_eq!(registered.status(), StatusCode::OK);

    let response = login(&harness.app, &email, PASSWORD).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Email not confirmed");

    let user = harness.users.find_by_email(&email).await.unwrap().unwrap();
    harness.users.confirm_email(user.id).await.unwrap();

    let response = login(&harness.app, &email, "Wr0ng$pass").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid password");

    let response = login(&harness.app, &email, PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["username"], username.as_str());
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn refresh_rotates_the_cookie_and_extends_the_token() {
    let harness = harness().await;
    let email = confirmed_user(&harness).await;

    let response = login(&harness.app, &email, PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
    let first_cookie = refresh_cookie_of(&response);
    let first_token = body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    // Immediately, so both tokens are issued within the same second
    let response = refresh(&harness.app, &first_token, &first_cookie).await;
    assert_eq!(response.status(), StatusCode::OK);
    let second_cookie = refresh_cookie_of(&response);
    let second_token = body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    assert_ne!(second_cookie, first_cookie);
    assert!(read_expiry(&second_token).unwrap() > read_expiry(&first_token).unwrap());

    let revoked: bool = sqlx::query_scalar(
        "SELECT revoked_at IS NOT NULL FROM refresh_tokens WHERE token_hash = $1",
    )
    .bind(hash_token(&first_cookie))
    .fetch_one(&harness.pool)
    .await
    .unwrap();
    assert!(revoked);

    let replay = refresh(&harness.app, &second_token, &first_cookie).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);

    let response = refresh(&harness.app, &second_token, &second_cookie).await;
    assert_eq!(response.status(), StatusCode::OK);
}
