//! In-memory store for testing and ephemeral sessions.

use crate::error::{StorageError, StorageResult};
use crate::store::{keyed, LocalStore, Record};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

type Collections = HashMap<String, BTreeMap<String, Record>>;

/// An in-memory store.
///
/// This store keeps all collections in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Sessions that don't need to survive a restart
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across tasks.
///
/// # Example
///
/// ```rust
/// use lorekeep_storage::{LocalStore, MemoryStore};
///
/// let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// rt.block_on(async {
///     let store = MemoryStore::new();
///     assert!(store.get_all("Notes").await.unwrap().is_empty());
/// });
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
    closed: AtomicBool,
}

impl MemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records in a collection.
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Returns true if the store holds no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.read().values().all(BTreeMap::is_empty)
    }

    fn check_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Record>> {
        self.check_open()?;
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned())
    }

    async fn get_all(&self, collection: &str) -> StorageResult<Vec<Record>> {
        self.check_open()?;
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn put(&self, collection: &str, record: Record) -> StorageResult<()> {
        self.bulk_put(collection, vec![record]).await
    }

    async fn bulk_put(&self, collection: &str, records: Vec<Record>) -> StorageResult<()> {
        self.check_open()?;
        // Validate everything before touching the map so the write is all-or-nothing.
        let keyed = keyed(collection, records)?;
        let mut collections = self.collections.write();
        let target = collections.entry(collection.to_string()).or_default();
        target.extend(keyed);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<()> {
        self.check_open()?;
        if let Some(records) = self.collections.write().get_mut(collection) {
            records.remove(id);
        }
        Ok(())
    }

    async fn clear(&self, collection: &str) -> StorageResult<()> {
        self.check_open()?;
        if let Some(records) = self.collections.write().get_mut(collection) {
            records.clear();
        }
        Ok(())
    }

    async fn collections(&self) -> StorageResult<Vec<String>> {
        self.check_open()?;
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn ensure_collections(&self, names: &[String]) -> StorageResult<()> {
        self.check_open()?;
        let mut collections = self.collections.write();
        for name in names {
            collections.entry(name.clone()).or_default();
        }
        Ok(())
    }

    async fn destroy(&self) -> StorageResult<()> {
        self.collections.write().clear();
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn memory_new_is_empty() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert!(store.get_all("Bestiary").await.unwrap().is_empty());
        assert!(store.get("Bestiary", "x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_put_creates_collection() {
        let store = MemoryStore::new();
        store
            .put("Bestiary", record(json!({ "id": "gob", "hp": 7 })))
            .await
            .unwrap();

        assert_eq!(store.collections().await.unwrap(), vec!["Bestiary"]);
        let found = store.get("Bestiary", "gob").await.unwrap().unwrap();
        assert_eq!(found["hp"], 7);
    }

    #[tokio::test]
    async fn memory_put_upserts_by_id() {
        let store = MemoryStore::new();
        store
            .put("Bestiary", record(json!({ "id": "gob", "hp": 7 })))
            .await
            .unwrap();
        store
            .put("Bestiary", record(json!({ "id": "gob", "hp": 3 })))
            .await
            .unwrap();

        assert_eq!(store.len("Bestiary"), 1);
        let found = store.get("Bestiary", "gob").await.unwrap().unwrap();
        assert_eq!(found["hp"], 3);
    }

    #[tokio::test]
    async fn memory_bulk_put_is_all_or_nothing() {
        let store = MemoryStore::new();
        let result = store
            .bulk_put(
                "Inventory",
                vec![
                    record(json!({ "id": "rope" })),
                    record(json!({ "name": "no id" })),
                ],
            )
            .await;

        assert!(matches!(result, Err(StorageError::MissingId { .. })));
        assert_eq!(store.len("Inventory"), 0);
    }

    #[tokio::test]
    async fn memory_delete_and_clear_are_noops_when_absent() {
        let store = MemoryStore::new();
        store.delete("Notes", "missing").await.unwrap();
        store.clear("Notes").await.unwrap();

        store
            .bulk_put(
                "Notes",
                vec![record(json!({ "id": "a" })), record(json!({ "id": "b" }))],
            )
            .await
            .unwrap();
        store.delete("Notes", "a").await.unwrap();
        assert_eq!(store.len("Notes"), 1);

        store.clear("Notes").await.unwrap();
        assert_eq!(store.len("Notes"), 0);
    }

    #[tokio::test]
    async fn memory_ensure_collections() {
        let store = MemoryStore::new();
        store
            .ensure_collections(&["Skills".to_string(), "Metadata".to_string()])
            .await
            .unwrap();
        assert_eq!(store.collections().await.unwrap(), vec!["Metadata", "Skills"]);
    }

    #[tokio::test]
    async fn memory_destroy_closes_store() {
        let store = MemoryStore::new();
        store
            .put("Notes", record(json!({ "id": "a" })))
            .await
            .unwrap();
        store.destroy().await.unwrap();

        assert!(store.is_empty());
        assert!(matches!(
            store.get_all("Notes").await,
            Err(StorageError::Closed)
        ));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;
        use std::collections::BTreeMap;

        proptest! {
            #[test]
            fn later_writes_win(
                batches in prop::collection::vec(
                    prop::collection::vec(("[a-e]", any::<u8>()), 0..6),
                    1..5,
                )
            ) {
                let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
                let mut expected = BTreeMap::new();
                let stored = runtime.block_on(async {
                    let store = MemoryStore::new();
                    for batch in &batches {
                        let rows = batch
                            .iter()
                            .map(|(id, n)| record(json!({ "id": id, "n": n })))
                            .collect();
                        store.bulk_put("Loot", rows).await.unwrap();
                        for (id, n) in batch {
                            expected.insert(id.clone(), *n);
                        }
                    }
                    store.get_all("Loot").await.unwrap()
                });

                let stored: BTreeMap<String, u8> = stored
                    .iter()
                    .map(|r| (r["id"].as_str().unwrap().to_string(), r["n"].as_u64().unwrap() as u8))
                    .collect();
                prop_assert_eq!(stored, expected);
            }
        }
    }
}
