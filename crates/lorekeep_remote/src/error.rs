//! Error types for the remote gateway.

use thiserror::Error;

/// Result type for gateway operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors that can occur while talking to the backend.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// No usable credential, even after one refresh.
    #[error("authentication required: {0}")]
    AuthRequired(String),

    /// The backend answered with a non-success status.
    #[error("transport error: status {status}: {body}")]
    Transport {
        /// HTTP status code.
        status: u16,
        /// Response body, lossily decoded.
        body: String,
    },

    /// The response body is not structured data of the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The request never produced a response (connection, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The request could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),
}

impl RemoteError {
    /// Creates a transport error from a status and raw body.
    pub fn transport(status: u16, body: &[u8]) -> Self {
        Self::Transport {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }

    /// Returns true if the caller must obtain new credentials.
    pub fn is_auth_required(&self) -> bool {
        matches!(self, RemoteError::AuthRequired(_))
    }

    /// Returns the HTTP status, if the backend answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }
}
