//! Custom error types for the activities service
//!
//! Handlers produce `anyhow::Result<Option<Outcome<T>>>`; the helpers at the
//! bottom map that shape onto HTTP: a missing value is a 404, a failure a 400
//! carrying its message.

use axum::{
    Json,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use common::{Outcome, PagedList, PaginationHeader, error::ValidationErrors};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    /// Only the host may do this
    #[error("Forbidden")]
    Forbidden,

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// A handler ran and reported a failure
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND.into_response(),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Unauthorized" })),
            )
                .into_response(),
            ApiError::Forbidden => StatusCode::FORBIDDEN.into_response(),
            ApiError::Validation(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(e) => {
                error!("Unhandled error in activities service: {:#}", e);
                internal_error_response()
            }
        }
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

/// The generic 500 body
pub fn internal_error_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "statusCode": 500,
            "message": "Internal server error",
        })),
    )
        .into_response()
}

fn into_value<T>(result: anyhow::Result<Option<Outcome<T>>>) -> ApiResult<T> {
    match result? {
        None => Err(ApiError::NotFound),
        Some(Outcome::Success(value)) => Ok(value),
        Some(Outcome::Failure(message)) => Err(ApiError::BadRequest(message)),
    }
}

/// 200 with the value as JSON
pub fn handle_result<T: Serialize>(result: anyhow::Result<Option<Outcome<T>>>) -> ApiResult<Json<T>> {
    into_value(result).map(Json)
}

/// 200 with an empty body
pub fn handle_empty_result(result: anyhow::Result<Option<Outcome<()>>>) -> ApiResult<StatusCode> {
    into_value(result).map(|()| StatusCode::OK)
}

/// 200 with the page items as JSON and the paging metadata in the `Pagination` header
pub fn handle_paged_result<T: Serialize>(
    result: anyhow::Result<Option<Outcome<PagedList<T>>>>,
) -> ApiResult<Response> {
    let page = into_value(result)?;
    let header = page.header().to_header_value().map_err(anyhow::Error::from)?;
    let header = HeaderValue::from_str(&header).map_err(anyhow::Error::from)?;
    let name = HeaderName::from_bytes(PaginationHeader::NAME.as_bytes()).map_err(anyhow::Error::from)?;

    let mut response = Json(page.items).into_response();
    response.headers_mut().insert(name, header);

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use common::PagingParams;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn missing_value_is_not_found() {
        let result = handle_result::<u32>(Ok(None));
        assert!(matches!(result, Err(ApiError::NotFound)));
    }

    #[tokio::test]
    async fn failure_is_a_bad_request_with_its_message() {
        let response = handle_result::<u32>(Ok(Some(Outcome::failure("Failed to create activity"))))
            .unwrap_err()
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Failed to create activity");
    }

    #[tokio::test]
    async fn unexpected_errors_are_generic() {
        let response = handle_empty_result(Err(anyhow::anyhow!("deadlock detected")))
            .unwrap_err()
            .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body, json!({"statusCode": 500, "message": "Internal server error"}));
    }

    #[tokio::test]
    async fn paged_result_carries_pagination_header() {
        let page = PagedList::paginate(1..=25, PagingParams::new(2, 10));
        let response = handle_paged_result(Ok(Some(Outcome::success(page)))).unwrap();

        let header = response.headers().get(PaginationHeader::NAME).unwrap();
        let parsed = PaginationHeader::from_header_value(header.to_str().unwrap()).unwrap();
        assert_eq!(parsed.current_page, 2);
        assert_eq!(parsed.items_per_page, 10);
        assert_eq!(parsed.total_items, 25);
        assert_eq!(parsed.total_pages, 3);

        let body = body_json(response).await;
        assert_eq!(body, json!([11, 12, 13, 14, 15, 16, 17, 18, 19, 20]));
    }
}
