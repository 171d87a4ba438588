//! Configuration for the sync context.

use lorekeep_protocol::METADATA_COLLECTION;
use lorekeep_storage::StoreLocation;

/// Configuration for a [`crate::SyncContext`].
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Where the local store lives.
    pub store: StoreLocation,
    /// Collections created when the store is opened.
    pub collections: Vec<String>,
    /// Name of the reserved collection holding staleness stamps.
    pub metadata_collection: String,
    /// Whether refreshes of the same collection are serialized.
    ///
    /// When disabled, two concurrent refreshes of one collection may
    /// interleave their clear and bulk write.
    pub serialize_refreshes: bool,
    /// Whether [`crate::Repository::load`] revalidates in the background.
    pub background_revalidation: bool,
}

impl SyncConfig {
    /// Creates a configuration for an in-memory store with no collections.
    pub fn new() -> Self {
        Self {
            store: StoreLocation::Memory,
            collections: Vec::new(),
            metadata_collection: METADATA_COLLECTION.to_string(),
            serialize_refreshes: true,
            background_revalidation: true,
        }
    }

    /// Sets the store location.
    pub fn with_store(mut self, store: StoreLocation) -> Self {
        self.store = store;
        self
    }

    /// Adds a collection created on open.
    pub fn with_collection(mut self, name: impl Into<String>) -> Self {
        self.collections.push(name.into());
        self
    }

    /// Adds several collections created on open.
    pub fn with_collections<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collections.extend(names.into_iter().map(Into::into));
        self
    }

    /// Sets the metadata collection name.
    pub fn with_metadata_collection(mut self, name: impl Into<String>) -> Self {
        self.metadata_collection = name.into();
        self
    }

    /// Enables or disables serialized refreshes.
    pub fn with_serialize_refreshes(mut self, enabled: bool) -> Self {
        self.serialize_refreshes = enabled;
        self
    }

    /// Enables or disables background revalidation.
    pub fn with_background_revalidation(mut self, enabled: bool) -> Self {
        self.background_revalidation = enabled;
        self
    }

    /// Returns the configured collections plus the metadata collection,
    /// without duplicates.
    pub fn tracked_collections(&self) -> Vec<String> {
        let mut names = self.collections.clone();
        names.push(self.metadata_collection.clone());
        names.sort();
        names.dedup();
        names
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.store, StoreLocation::Memory);
        assert_eq!(config.metadata_collection, "Metadata");
        assert!(config.serialize_refreshes);
        assert!(config.background_revalidation);
        assert_eq!(config.tracked_collections(), vec!["Metadata"]);
    }

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new()
            .with_store(StoreLocation::Directory(PathBuf::from("/tmp/lk")))
            .with_collection("Notes")
            .with_collections(["Bestiary", "Notes"])
            .with_metadata_collection("Stamps")
            .with_serialize_refreshes(false)
            .with_background_revalidation(false);

        assert!(config.store.is_persistent());
        assert!(!config.serialize_refreshes);
        assert!(!config.background_revalidation);
        assert_eq!(
            config.tracked_collections(),
            vec!["Bestiary", "Notes", "Stamps"]
        );
    }
}
