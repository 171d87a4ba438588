//! Error types for repository operations.

use lorekeep_remote::RemoteError;
use lorekeep_storage::StorageError;
use thiserror::Error;

/// Result type for repository operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in repository operations.
///
/// Per-item failures inside a batch are not errors; they surface as
/// `ok: false` items of the batch result.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The local store is not open, was destroyed, or cannot be reached.
    #[error("local store unavailable: {0}")]
    StoreUnavailable(String),

    /// The local store failed.
    #[error("storage error: {0}")]
    Storage(#[source] StorageError),

    /// The remote call failed as a whole.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The remote refused a single create or update.
    #[error("remote rejected write to {collection} (id {id}): {reason}")]
    RemoteWriteRejected {
        /// Target collection.
        collection: String,
        /// The id the write carried, or `<none>`.
        id: String,
        /// The remote's explanation.
        reason: String,
    },

    /// A record could not be converted to or from the entity type.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// A background revalidation ended without delivering a result.
    #[error("background revalidation was cancelled")]
    Cancelled,
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        if err.is_unavailable() {
            CoreError::StoreUnavailable(err.to_string())
        } else {
            CoreError::Storage(err)
        }
    }
}

impl CoreError {
    /// Returns true if the store must be (re)opened before further use.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, CoreError::StoreUnavailable(_))
    }

    /// Returns true if the caller must obtain new credentials.
    pub fn is_auth_required(&self) -> bool {
        matches!(self, CoreError::Remote(e) if e.is_auth_required())
    }

    /// Returns true if the remote refused the write.
    pub fn is_rejected(&self) -> bool {
        matches!(self, CoreError::RemoteWriteRejected { .. })
    }
}
