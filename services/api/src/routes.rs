//! API service routes
//!
//! The router is the dispatch table: each request shape maps to one handler.

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use common::{
    database,
    filter::ActivityParams,
    jwt::Claims,
    models::{ActivityDto, ActivityInput, Profile},
    validation::validate_activity,
};
use std::any::Any;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::error;
use uuid::Uuid;

use crate::{
    chat::chat_handler,
    error::{
        ApiResult, handle_empty_result, handle_paged_result, handle_result,
        internal_error_response,
    },
    handlers,
    middleware::{auth_middleware, ensure_host},
    models::FollowParams,
    state::AppState,
};

/// Create the router for the API service
pub fn create_router(state: AppState, cors: CorsLayer) -> Router {
    let protected_routes = Router::new()
        .route("/activities", get(list_activities).post(create_activity))
        .route(
            "/activities/:id",
            get(activity_details).put(edit_activity).delete(delete_activity),
        )
        .route("/activities/:id/attend", post(update_attendance))
        .route("/profiles/:username", get(profile_details))
        .route("/follow/:username", get(follow_list).post(toggle_follow))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/chat", get(chat_handler))
        .nest("/api", protected_routes)
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
            "service": "api-service"
        }))
        .into_response(),
        Ok(false) => internal_error_response(),
        Err(e) => {
            error!("Health check failed: {}", e);
            internal_error_response()
        }
    }
}

pub async fn list_activities(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ActivityParams>,
) -> ApiResult<Response> {
    handle_paged_result(handlers::list_activities(&state, &claims, &params).await)
}

pub async fn activity_details(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ActivityDto>> {
    handle_result(handlers::activity_details(&state, &claims, id).await)
}

pub async fn create_activity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<ActivityInput>,
) -> ApiResult<StatusCode> {
    validate_activity(&input)?;
    handle_empty_result(handlers::create_activity(&state, &claims, &input).await)
}

pub async fn edit_activity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(input): Json<ActivityInput>,
) -> ApiResult<StatusCode> {
    validate_activity(&input)?;
    ensure_host(&state, id, &claims).await?;
    handle_empty_result(handlers::edit_activity(&state, id, &input).await)
}

pub async fn delete_activity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    ensure_host(&state, id, &claims).await?;
    handle_empty_result(handlers::delete_activity(&state, id).await)
}

pub async fn update_attendance(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    handle_empty_result(handlers::update_attendance(&state, &claims, id).await)
}

pub async fn profile_details(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(username): Path<String>,
) -> ApiResult<Json<Profile>> {
    handle_result(handlers::profile_details(&state, &claims, &username).await)
}

pub async fn toggle_follow(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(username): Path<String>,
) -> ApiResult<StatusCode> {
    handle_empty_result(handlers::toggle_follow(&state, &claims, &username).await)
}

pub async fn follow_list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(username): Path<String>,
    Query(params): Query<FollowParams>,
) -> ApiResult<Json<Vec<Profile>>> {
    handle_result(handlers::follow_list(&state, &claims, &username, params.predicate).await)
}

fn handle_panic(_: Box<dyn Any + Send + 'static>) -> Response {
    error!("Request handler panicked");
    internal_error_response()
}
