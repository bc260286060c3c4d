use crate::services::token_issuer::IssueError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Client-visible errors.
///
/// Messages are deliberately generic: an expired token, a forged token and a
/// garbled header all read as "invalid token", and an unknown user reads the
/// same as a wrong password.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Insufficient role: requires one of {required:?}")]
    Forbidden { required: Vec<String> },

    #[error("Internal server error")]
    Internal,
}

impl From<IssueError> for AuthError {
    fn from(err: IssueError) -> Self {
        match err {
            IssueError::UserNotFound
            | IssueError::InvalidCredentials
            | IssueError::Lookup(_) => AuthError::InvalidCredentials,
            IssueError::Encoding(_) => AuthError::Internal,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    required_roles: Option<Vec<String>>,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message, required_roles) = match &self {
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid username or password".to_string(),
                None,
            ),
            AuthError::InvalidToken(reason) => (
                StatusCode::UNAUTHORIZED,
                "INVALID_TOKEN",
                reason.clone(),
                None,
            ),
            AuthError::Forbidden { required } => (
                StatusCode::FORBIDDEN,
                "INSUFFICIENT_ROLE",
                "The authenticated user lacks the required role".to_string(),
                Some(required.clone()),
            ),
            AuthError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                required_roles,
            },
        };

        let mut response = (status, Json(error_response)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}
