//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The platform denied access to the store, or another process holds it.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// A record was written without a string `id` attribute.
    #[error("record in collection {collection} has no string id")]
    MissingId {
        /// The collection the write targeted.
        collection: String,
    },

    /// The on-disk store is corrupted or from an unsupported version.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The store has been destroyed and must be reopened.
    #[error("store is closed")]
    Closed,
}

impl StorageError {
    /// Creates a codec error from any displayable cause.
    pub fn codec(cause: impl std::fmt::Display) -> Self {
        Self::Codec(cause.to_string())
    }

    /// Returns true if the store cannot be used until it is reopened.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_) | StorageError::Closed)
    }
}
