use thiserror::Error;

/// Errors that can occur in the eventcast SDK
#[derive(Error, Debug)]
pub enum ClientError {
    /// Stream already exists (HTTP 409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Stream does not exist (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Server rejected the payload (HTTP 400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Any other non-success status
    #[error("Server error: HTTP {status}: {body}")]
    Server { status: u16, body: String },

    /// Endpoint is not a usable base URL
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Connection error (failed to connect to SSE endpoint)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Payload must serialize to a JSON object
    #[error("Payload is not a JSON object")]
    NotAnObject,

    /// HTTP error from reqwest
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Map a non-success response status and body to an error.
    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        match status {
            reqwest::StatusCode::CONFLICT => ClientError::Conflict(body),
            reqwest::StatusCode::NOT_FOUND => ClientError::NotFound(body),
            reqwest::StatusCode::BAD_REQUEST => ClientError::BadRequest(body),
            other => ClientError::Server {
                status: other.as_u16(),
                body,
            },
        }
    }
}

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, ClientError>;
