//! Store location selection.

use crate::error::StorageResult;
use crate::file::{FileStore, FileStoreConfig};
use crate::memory::MemoryStore;
use crate::store::LocalStore;
use std::path::PathBuf;
use std::sync::Arc;

/// Where the local store lives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StoreLocation {
    /// An ephemeral in-memory store. Every open starts empty.
    #[default]
    Memory,
    /// A persistent store rooted at the given directory.
    Directory(PathBuf),
}

impl StoreLocation {
    /// Opens a store at this location and ensures the named collections exist.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::Unavailable`] if the platform denies
    /// access to the location.
    pub async fn open(&self, collections: &[String]) -> StorageResult<Arc<dyn LocalStore>> {
        let store: Arc<dyn LocalStore> = match self {
            StoreLocation::Memory => Arc::new(MemoryStore::new()),
            StoreLocation::Directory(path) => {
                Arc::new(FileStore::open(path, FileStoreConfig::default())?)
            }
        };
        store.ensure_collections(collections).await?;
        Ok(store)
    }

    /// Returns true if data at this location survives a restart.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, StoreLocation::Directory(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn memory_location_opens_fresh_store() {
        let location = StoreLocation::Memory;
        assert!(!location.is_persistent());

        let store = location.open(&["Notes".to_string()]).await.unwrap();
        assert_eq!(store.collections().await.unwrap(), vec!["Notes"]);
    }

    #[tokio::test]
    async fn directory_location_opens_file_store() {
        let dir = tempdir().unwrap();
        let location = StoreLocation::Directory(dir.path().join("cache"));
        assert!(location.is_persistent());

        let store = location
            .open(&["Bestiary".to_string(), "Metadata".to_string()])
            .await
            .unwrap();
        assert_eq!(store.collections().await.unwrap(), vec!["Bestiary", "Metadata"]);
    }
}
