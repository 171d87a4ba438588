//! Store manifest for on-disk metadata.

use crate::error::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current manifest major version.
///
/// Stores written by a newer major version are refused.
pub const MANIFEST_VERSION: u16 = 1;

/// On-disk store manifest.
///
/// The manifest stores:
/// - Format version
/// - Collection registry (name to snapshot file stem)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Format version (major, minor).
    pub format_version: (u16, u16),
    /// Collection name to snapshot file stem.
    pub collections: BTreeMap<String, String>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new((MANIFEST_VERSION, 0))
    }
}

impl Manifest {
    /// Creates a new empty manifest.
    #[must_use]
    pub fn new(format_version: (u16, u16)) -> Self {
        Self {
            format_version,
            collections: BTreeMap::new(),
        }
    }

    /// Registers a collection, returning its snapshot file stem.
    ///
    /// Returns `true` as the second element when the collection is new.
    pub fn register(&mut self, name: &str) -> (String, bool) {
        if let Some(stem) = self.collections.get(name) {
            return (stem.clone(), false);
        }
        let stem = file_stem(name);
        self.collections.insert(name.to_string(), stem.clone());
        (stem, true)
    }

    /// Gets the snapshot file stem of a collection.
    #[must_use]
    pub fn stem(&self, name: &str) -> Option<&str> {
        self.collections.get(name).map(String::as_str)
    }

    /// Encodes the manifest to CBOR.
    pub fn encode(&self) -> StorageResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(StorageError::codec)?;
        Ok(buf)
    }

    /// Decodes a manifest from CBOR.
    ///
    /// # Errors
    ///
    /// Fails with [`StorageError::Corrupted`] if the bytes are not a manifest
    /// or were written by a newer major version.
    pub fn decode(data: &[u8]) -> StorageResult<Self> {
        let manifest: Manifest = ciborium::from_reader(data)
            .map_err(|e| StorageError::Corrupted(format!("invalid manifest: {e}")))?;

        if manifest.format_version.0 > MANIFEST_VERSION {
            return Err(StorageError::Corrupted(format!(
                "unsupported manifest version: {}.{}",
                manifest.format_version.0, manifest.format_version.1
            )));
        }

        Ok(manifest)
    }
}

/// Collection names may hold any character; file names may not.
fn file_stem(name: &str) -> String {
    hex::encode(name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_stable() {
        let mut manifest = Manifest::default();
        let (stem, created) = manifest.register("Battle Log");
        assert!(created);
        assert_eq!(stem, hex::encode("Battle Log"));

        let (again, created) = manifest.register("Battle Log");
        assert!(!created);
        assert_eq!(again, stem);
        assert_eq!(manifest.stem("Battle Log"), Some(stem.as_str()));
    }

    #[test]
    fn encode_decode() {
        let mut manifest = Manifest::default();
        manifest.register("Characters");
        manifest.register("Metadata");

        let bytes = manifest.encode().unwrap();
        assert_eq!(Manifest::decode(&bytes).unwrap(), manifest);
    }

    #[test]
    fn rejects_newer_major_version() {
        let manifest = Manifest::new((MANIFEST_VERSION + 1, 0));
        let bytes = manifest.encode().unwrap();
        assert!(matches!(
            Manifest::decode(&bytes),
            Err(StorageError::Corrupted(_))
        ));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            Manifest::decode(b"not cbor at all"),
            Err(StorageError::Corrupted(_))
        ));
    }
}
