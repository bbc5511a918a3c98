//! Error kinds shared by the engine and the HTTP boundary.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Error types for stream operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("stream {0} already exists")]
    Conflict(String),

    #[error("stream {0} does not exist")]
    NotFound(String),

    #[error("invalid data: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StreamError {
    /// HTTP status the boundary reports for this kind.
    pub fn status_code(&self) -> StatusCode {
        match self {
            StreamError::Conflict(_) => StatusCode::CONFLICT,
            StreamError::NotFound(_) => StatusCode::NOT_FOUND,
            StreamError::BadRequest(_) => StatusCode::BAD_REQUEST,
            StreamError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON body returned alongside an error status.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub detail: String,
}

impl IntoResponse for StreamError {
    fn into_response(self) -> Response {
        let detail = match &self {
            StreamError::BadRequest(reason) | StreamError::Internal(reason) => reason.clone(),
            StreamError::Conflict(_) | StreamError::NotFound(_) => String::new(),
        };
        let body = ApiError {
            error: self.to_string(),
            detail,
        };
        (self.status_code(), Json(body)).into_response()
    }
}
