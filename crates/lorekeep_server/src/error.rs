//! Error types for the reference backend.

use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while serving a request.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Missing, forged, expired or revoked credential.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// No endpoint at the requested path.
    #[error("no such endpoint: {0}")]
    NotFound(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidRequest(_) | ServerError::NotAuthorized(_) | ServerError::NotFound(_)
        )
    }

    /// Returns the HTTP status this error is answered with.
    pub fn status(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) => 400,
            ServerError::NotAuthorized(_) => 401,
            ServerError::NotFound(_) => 404,
            ServerError::Internal(_) => 500,
        }
    }
}

impl From<lorekeep_protocol::ProtocolError> for ServerError {
    fn from(err: lorekeep_protocol::ProtocolError) -> Self {
        ServerError::InvalidRequest(err.to_string())
    }
}
