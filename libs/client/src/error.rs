//! Error types for the client store
//!
//! Non-success responses are mapped by status the same way for every call:
//! validation bodies keep their field map, 401 keeps the server's message and
//! a 5xx keeps the generic server error so the store can surface it.

use common::error::ValidationErrors;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body of a 5xx response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerError {
    pub status_code: u16,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    error: String,
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    #[error("Server error {}: {}", .0.status_code, .0.message)]
    Server(ServerError),

    #[error("Unexpected response status {0}")]
    UnexpectedStatus(u16),

    /// The operation needs a signed-in user
    #[error("Not signed in")]
    NotSignedIn,

    /// The operation works on the selected activity and none is selected
    #[error("No activity selected")]
    NothingSelected,

    /// A logout or a newer session replaced the one being renewed
    #[error("Session changed during token refresh")]
    SessionChanged,

    #[error("Chat is not connected")]
    ChatDisconnected,

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Chat(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Type alias for client results
pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// Map a non-success response onto the error taxonomy
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let message = || {
            serde_json::from_str::<MessageBody>(body)
                .map(|body| body.error)
                .ok()
        };

        match status {
            StatusCode::BAD_REQUEST => match serde_json::from_str::<ValidationErrors>(body) {
                Ok(errors) => ClientError::Validation(errors),
                Err(_) => ClientError::BadRequest(message().unwrap_or_else(|| body.to_string())),
            },
            StatusCode::UNAUTHORIZED => {
                ClientError::Unauthorized(message().unwrap_or_else(|| "Unauthorized".to_string()))
            }
            StatusCode::FORBIDDEN => ClientError::Forbidden,
            StatusCode::NOT_FOUND => ClientError::NotFound,
            status if status.is_server_error() => {
                ClientError::Server(serde_json::from_str(body).unwrap_or_else(|_| ServerError {
                    status_code: status.as_u16(),
                    message: "Internal server error".to_string(),
                }))
            }
            status => ClientError::UnexpectedStatus(status.as_u16()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_body_keeps_its_fields() {
        let error = ClientError::from_response(
            StatusCode::BAD_REQUEST,
            r#"{"errors":{"email":["Email taken"]}}"#,
        );

        match error {
            ClientError::Validation(errors) => {
                assert_eq!(errors.errors["email"], vec!["Email taken".to_string()]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn failure_message_becomes_a_bad_request() {
        let error = ClientError::from_response(
            StatusCode::BAD_REQUEST,
            r#"{"error":"Failed to create activity"}"#,
        );

        assert!(matches!(error, ClientError::BadRequest(m) if m == "Failed to create activity"));
    }

    #[test]
    fn unauthorized_keeps_the_reason() {
        let error = ClientError::from_response(StatusCode::UNAUTHORIZED, r#"{"error":"Invalid password"}"#);
        assert_eq!(error.to_string(), "Invalid password");

        let bare = ClientError::from_response(StatusCode::UNAUTHORIZED, "");
        assert_eq!(bare.to_string(), "Unauthorized");
    }

    #[test]
    fn server_errors_keep_the_generic_body() {
        let error = ClientError::from_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"statusCode":500,"message":"Internal server error"}"#,
        );

        match error {
            ClientError::Server(server) => assert_eq!(server.status_code, 500),
            other => panic!("expected server error, got {other:?}"),
        }

        let gateway = ClientError::from_response(StatusCode::BAD_GATEWAY, "<html>");
        assert!(matches!(gateway, ClientError::Server(ServerError { status_code: 502, .. })));
    }
}
