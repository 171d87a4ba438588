//! Local store trait definition.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// A schema-free record: attribute name to JSON value.
///
/// The only attribute the store interprets is `id`, which must be a string.
pub type Record = Map<String, Value>;

/// Returns the record's `id` if it is a string.
pub fn record_id(record: &Record) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

/// Pairs each record with its id, failing on the first record without one.
pub(crate) fn keyed(
    collection: &str,
    records: Vec<Record>,
) -> StorageResult<Vec<(String, Record)>> {
    records
        .into_iter()
        .map(|record| match record_id(&record) {
            Some(id) => Ok((id.to_string(), record)),
            None => Err(StorageError::MissingId {
                collection: collection.to_string(),
            }),
        })
        .collect()
}

/// An embedded store organized into named collections.
///
/// Collections hold records keyed by their `id`. Writes to an unknown
/// collection create it. Absence is a normal outcome for lookups and is
/// reported as `None` or an empty sequence, never as an error.
///
/// # Invariants
///
/// - `put` and `bulk_put` upsert by `id` and are each atomic
/// - `delete` and `clear` are no-ops when the target is absent
/// - After `destroy`, every call fails with [`crate::StorageError::Closed`]
///
/// # Implementors
///
/// - [`crate::MemoryStore`] - For testing
/// - [`crate::FileStore`] - For persistent storage
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Gets a record by id.
    async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Record>>;

    /// Returns every record of a collection. Order is not meaningful.
    async fn get_all(&self, collection: &str) -> StorageResult<Vec<Record>>;

    /// Upserts a single record.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::StorageError::MissingId`] if the record has no
    /// string `id`.
    async fn put(&self, collection: &str, record: Record) -> StorageResult<()>;

    /// Upserts many records in one atomic step.
    ///
    /// Either every record is written or none is.
    async fn bulk_put(&self, collection: &str, records: Vec<Record>) -> StorageResult<()>;

    /// Removes a record. No-op if absent.
    async fn delete(&self, collection: &str, id: &str) -> StorageResult<()>;

    /// Removes every record of a collection. No-op if the collection is unknown.
    async fn clear(&self, collection: &str) -> StorageResult<()>;

    /// Returns the names of all known collections.
    async fn collections(&self) -> StorageResult<Vec<String>>;

    /// Creates any of the named collections that do not exist yet.
    async fn ensure_collections(&self, names: &[String]) -> StorageResult<()>;

    /// Erases the entire store and closes this handle.
    async fn destroy(&self) -> StorageResult<()>;
}
