//! Error types for the wire protocol.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding or decoding wire messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The bytes are not JSON of the expected shape.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A record is missing a field the protocol requires.
    #[error("missing field {field} in {context}")]
    MissingField {
        /// The missing field.
        field: &'static str,
        /// Where the field was expected.
        context: String,
    },
}

impl ProtocolError {
    /// Creates a missing-field error.
    pub fn missing(field: &'static str, context: impl Into<String>) -> Self {
        Self::MissingField {
            field,
            context: context.into(),
        }
    }
}
