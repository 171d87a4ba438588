//! Remote-authoritative repositories mirrored into the local store.
//!
//! A [`Repository`] is bound to one collection. Reads are served from the
//! local store; writes go to the remote first and are mirrored locally only
//! once the remote confirms them. A failed write never touches the local
//! store.
//!
//! ## Refresh
//!
//! A refresh fetches the collection and the metadata collection in one
//! call, replaces the local collection (clear, then bulk write) and records
//! the stamp that came with it. [`Repository::sync`] refreshes only when the
//! stamps show drift.
//!
//! ## Cache-aside reads
//!
//! [`Repository::load`] answers from the local store at once and revalidates
//! in a background task. The first answer may be stale; the fresh one, if
//! any, arrives through the [`Revalidation`] handle.

use crate::context::SyncContext;
use crate::error::{CoreError, CoreResult};
use crate::id::{normalize_id, normalize_record_id};
use crate::staleness::Staleness;
use lorekeep_protocol::{BatchEnvelope, BatchResult, ItemResult, Record};
use lorekeep_remote::RemoteError;
use lorekeep_storage::{record_id, LocalStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

/// A collection of entities of type `T`.
///
/// Cloning is cheap; clones share the same context.
pub struct Repository<T> {
    context: Arc<SyncContext>,
    collection: Arc<str>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
            collection: Arc::clone(&self.collection),
            _entity: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("collection", &self.collection)
            .finish()
    }
}

/// Where the items of a [`Loaded`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    /// Served from the local store; may be stale.
    Local,
    /// The local store was empty, so the collection was refreshed first.
    Refreshed,
}

/// The answer of [`Repository::load`].
#[derive(Debug)]
pub struct Loaded<T> {
    /// The entities.
    pub items: Vec<T>,
    /// Where they came from.
    pub origin: LoadOrigin,
    /// The background revalidation, when one was started.
    pub revalidation: Option<Revalidation<T>>,
}

/// Handle to a background revalidation.
#[derive(Debug)]
pub struct Revalidation<T> {
    receiver: oneshot::Receiver<CoreResult<Option<Vec<T>>>>,
}

impl<T> Revalidation<T> {
    /// Waits for the revalidation.
    ///
    /// Yields `Some(fresh)` if the collection was refreshed, `None` if the
    /// local copy was current.
    pub async fn fresh(self) -> CoreResult<Option<Vec<T>>> {
        self.receiver.await.map_err(|_| CoreError::Cancelled)?
    }
}

/// The outcome of a batch on one collection.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    /// The raw per-item results, positionally aligned with the input.
    pub items: Vec<ItemResult>,
    /// Entities the remote accepted, as now stored locally.
    pub applied: Vec<T>,
    /// Ids the remote deleted.
    pub deleted: Vec<String>,
}

impl<T> BatchOutcome<T> {
    /// Returns the rejected items.
    pub fn failures(&self) -> impl Iterator<Item = &ItemResult> {
        self.items.iter().filter(|item| !item.ok)
    }

    /// Returns the number of rejected items.
    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// Returns true if every item was applied.
    pub fn all_ok(&self) -> bool {
        self.failure_count() == 0
    }
}

impl<T> Repository<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    /// Creates a repository over `collection`.
    pub fn new(context: Arc<SyncContext>, collection: impl Into<String>) -> Self {
        Self {
            context,
            collection: Arc::from(collection.into()),
            _entity: PhantomData,
        }
    }

    /// Generates a client-side id for an entity about to be created.
    ///
    /// Ids from one context sort in generation order.
    pub fn new_id(&self) -> String {
        self.context.ids().next_id()
    }

    /// Returns the collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the shared context.
    pub fn context(&self) -> &Arc<SyncContext> {
        &self.context
    }

    /// Creates an entity remotely, then stores the remote's version locally.
    ///
    /// The result is the submitted attributes overlaid with whatever the
    /// remote returned (an assigned id, a row position).
    #[instrument(skip_all, fields(collection = %self.collection))]
    pub async fn create(&self, entity: &T) -> CoreResult<T> {
        let store = self.context.store().await?;
        let submitted = to_record(entity)?;
        let records = BTreeMap::from([(self.collection.to_string(), vec![submitted.clone()])]);
        let result = self.context.gateway().create(records).await?;

        let item = single(result.created(&self.collection), "create")?;
        let merged = self.accepted(submitted, item)?;
        store.put(&self.collection, merged.clone()).await?;
        debug!(id = record_id(&merged), "created");
        from_record(merged)
    }

    /// Updates an entity remotely, then stores the merged result locally.
    #[instrument(skip_all, fields(collection = %self.collection))]
    pub async fn update(&self, entity: &T) -> CoreResult<T> {
        let store = self.context.store().await?;
        let submitted = to_record(entity)?;
        let records = BTreeMap::from([(self.collection.to_string(), vec![submitted.clone()])]);
        let result = self.context.gateway().update_by_id(records).await?;

        let item = single(result.updated(&self.collection), "update")?;
        let merged = self.accepted(submitted, item)?;
        store.put(&self.collection, merged.clone()).await?;
        debug!(id = record_id(&merged), "updated");
        from_record(merged)
    }

    /// Deletes an entity remotely, then locally.
    ///
    /// Returns `false`, leaving the local store alone, when the remote could
    /// not delete the id.
    #[instrument(skip_all, fields(collection = %self.collection, id = %id))]
    pub async fn delete(&self, id: &str) -> CoreResult<bool> {
        let store = self.context.store().await?;
        let ids = BTreeMap::from([(self.collection.to_string(), vec![id.to_string()])]);
        let result = self.context.gateway().delete_by_id(ids).await?;

        let item = single(result.deleted(&self.collection), "delete")?;
        if !item.ok {
            warn!(reason = item.reason(), "remote refused delete");
            return Ok(false);
        }
        store.delete(&self.collection, id).await?;
        debug!("deleted");
        Ok(true)
    }

    /// Returns every locally stored entity without contacting the remote.
    pub async fn get_local(&self) -> CoreResult<Vec<T>> {
        let store = self.context.store().await?;
        store
            .get_all(&self.collection)
            .await?
            .into_iter()
            .map(from_record)
            .collect()
    }

    /// Looks up one entity.
    ///
    /// With `prefer_local` only the local store is consulted and absence is
    /// the answer. Otherwise the remote is asked; what it returns is not
    /// stored.
    #[instrument(skip_all, fields(collection = %self.collection, id = %id, prefer_local = prefer_local))]
    pub async fn get_by_id(&self, id: &str, prefer_local: bool) -> CoreResult<Option<T>> {
        if prefer_local {
            let store = self.context.store().await?;
            return store
                .get(&self.collection, id)
                .await?
                .map(from_record)
                .transpose();
        }

        self.context.store().await?;
        let ids = BTreeMap::from([(self.collection.to_string(), vec![id.to_string()])]);
        let mut fetched = self.context.gateway().get_by_id(ids).await?;
        let found = fetched
            .remove(&*self.collection)
            .unwrap_or_default()
            .into_iter()
            .map(|mut record| {
                normalize_record_id(&mut record);
                record
            })
            .find(|record| record_id(record) == Some(id));
        found.map(from_record).transpose()
    }

    /// Replaces the local collection with the remote one.
    ///
    /// Fetches the collection and its stamp in one call, then clears the
    /// local collection, writes the fetched records and records the stamp.
    #[instrument(skip_all, fields(collection = %self.collection))]
    pub async fn force_fetch(&self) -> CoreResult<Vec<T>> {
        let store = self.context.store().await?;
        let metadata = self.context.metadata_collection().to_string();

        let names = [self.collection.to_string(), metadata.clone()];
        let mut fetched = self.context.gateway().get_all(&names).await?;

        let mut records = fetched.remove(&*self.collection).unwrap_or_default();
        records.iter_mut().for_each(normalize_record_id);
        // Rows that cannot be keyed are dropped before the local copy is touched.
        records.retain(|record| {
            let keyed = record_id(record).is_some();
            if !keyed {
                warn!(id = ?record.get("id"), "skipping remote row without a usable id");
            }
            keyed
        });
        let stamps = fetched.remove(&metadata).unwrap_or_default();

        {
            let _guard = self.context.refresh_guard(&self.collection).await;
            store.clear(&self.collection).await?;
            store.bulk_put(&self.collection, records.clone()).await?;
            Staleness::new(&self.context)
                .record_baseline(&self.collection, &stamps)
                .await?;
        }

        info!(records = records.len(), "collection refreshed");
        records.into_iter().map(from_record).collect()
    }

    /// Refreshes the collection if its stamp shows drift.
    ///
    /// Returns true if a refresh happened. When the stamps agree nothing is
    /// written.
    pub async fn sync(&self) -> CoreResult<bool> {
        Ok(self.revalidate().await?.is_some())
    }

    /// Cache-aside read.
    ///
    /// A non-empty local collection is returned at once, with a background
    /// revalidation unless disabled. An empty one is refreshed first.
    #[instrument(skip_all, fields(collection = %self.collection))]
    pub async fn load(&self) -> CoreResult<Loaded<T>> {
        let local = self.get_local().await?;
        if local.is_empty() {
            debug!("local collection empty, refreshing inline");
            let items = self.force_fetch().await?;
            return Ok(Loaded {
                items,
                origin: LoadOrigin::Refreshed,
                revalidation: None,
            });
        }

        let revalidation = self
            .context
            .config()
            .background_revalidation
            .then(|| self.spawn_revalidation());
        Ok(Loaded {
            items: local,
            origin: LoadOrigin::Local,
            revalidation,
        })
    }

    /// Creates many entities in one round trip.
    ///
    /// Each item stands alone: accepted ones are stored locally, rejected
    /// ones are reported. Nothing is rolled back.
    #[instrument(skip_all, fields(collection = %self.collection, count = entities.len()))]
    pub async fn create_batch(&self, entities: &[T]) -> CoreResult<BatchOutcome<T>> {
        let store = self.context.store().await?;
        let submitted = entities.iter().map(to_record).collect::<CoreResult<Vec<_>>>()?;
        let records = BTreeMap::from([(self.collection.to_string(), submitted.clone())]);
        let result = self.context.gateway().create(records).await?;

        let items = result.created(&self.collection).to_vec();
        let applied = mirror_writes(store.as_ref(), &self.collection, submitted, &items).await?;
        self.outcome(items, applied, Vec::new())
    }

    /// Updates many entities in one round trip.
    #[instrument(skip_all, fields(collection = %self.collection, count = entities.len()))]
    pub async fn update_batch(&self, entities: &[T]) -> CoreResult<BatchOutcome<T>> {
        let store = self.context.store().await?;
        let submitted = entities.iter().map(to_record).collect::<CoreResult<Vec<_>>>()?;
        let records = BTreeMap::from([(self.collection.to_string(), submitted.clone())]);
        let result = self.context.gateway().update_by_id(records).await?;

        let items = result.updated(&self.collection).to_vec();
        let applied = mirror_writes(store.as_ref(), &self.collection, submitted, &items).await?;
        self.outcome(items, applied, Vec::new())
    }

    /// Deletes many ids in one round trip.
    #[instrument(skip_all, fields(collection = %self.collection, count = ids.len()))]
    pub async fn delete_batch(&self, ids: &[String]) -> CoreResult<BatchOutcome<T>> {
        let store = self.context.store().await?;
        let request = BTreeMap::from([(self.collection.to_string(), ids.to_vec())]);
        let result = self.context.gateway().delete_by_id(request).await?;

        let items = result.deleted(&self.collection).to_vec();
        let deleted = mirror_deletes(store.as_ref(), &self.collection, ids, &items).await?;
        self.outcome(items, Vec::new(), deleted)
    }

    async fn revalidate(&self) -> CoreResult<Option<Vec<T>>> {
        if Staleness::new(&self.context).is_stale(&self.collection).await? {
            self.force_fetch().await.map(Some)
        } else {
            debug!(collection = %self.collection, "collection is current");
            Ok(None)
        }
    }

    fn spawn_revalidation(&self) -> Revalidation<T> {
        let (sender, receiver) = oneshot::channel();
        let repository = self.clone();
        tokio::spawn(async move {
            let result = repository.revalidate().await;
            if let Err(err) = &result {
                warn!(collection = %repository.collection, error = %err, "background revalidation failed");
            }
            // The caller may have dropped the handle.
            let _ = sender.send(result);
        });
        Revalidation { receiver }
    }

    fn accepted(&self, submitted: Record, item: &ItemResult) -> CoreResult<Record> {
        if !item.ok {
            let id = item
                .id
                .as_ref()
                .or_else(|| submitted.get("id"))
                .map(normalize_id)
                .unwrap_or_else(|| "<none>".to_string());
            warn!(id = %id, reason = item.reason(), "remote rejected write");
            return Err(CoreError::RemoteWriteRejected {
                collection: self.collection.to_string(),
                id,
                reason: item.reason().to_string(),
            });
        }
        Ok(merge(submitted, item))
    }

    fn outcome(
        &self,
        items: Vec<ItemResult>,
        applied: Vec<Record>,
        deleted: Vec<String>,
    ) -> CoreResult<BatchOutcome<T>> {
        let outcome = BatchOutcome {
            items,
            applied: applied.into_iter().map(from_record).collect::<CoreResult<_>>()?,
            deleted,
        };
        let failures = outcome.failure_count();
        if failures > 0 {
            warn!(failures, "batch items rejected");
        }
        Ok(outcome)
    }
}

/// Executes a batch across collections in one round trip and mirrors every
/// accepted item locally.
///
/// One round trip is not a transaction: rejected items are reported in the
/// result and accepted ones stay applied.
pub async fn batch(context: &SyncContext, envelope: BatchEnvelope) -> CoreResult<BatchResult> {
    let store = context.store().await?;
    debug!(
        items = envelope.item_count(),
        collections = envelope.collections().len(),
        "multi-collection batch"
    );
    let result = context.gateway().batch(envelope.clone()).await?;

    for (collection, records) in envelope.create {
        mirror_writes(store.as_ref(), &collection, records, result.created(&collection)).await?;
    }
    for (collection, records) in envelope.update_by_id {
        mirror_writes(store.as_ref(), &collection, records, result.updated(&collection)).await?;
    }
    for (collection, ids) in envelope.delete_by_id {
        mirror_deletes(store.as_ref(), &collection, &ids, result.deleted(&collection)).await?;
    }

    let failures = result.failure_count();
    if failures > 0 {
        warn!(failures, "batch items rejected");
    }
    Ok(result)
}

/// Stores every accepted write in one bulk step and returns what was stored.
async fn mirror_writes(
    store: &dyn LocalStore,
    collection: &str,
    submitted: Vec<Record>,
    items: &[ItemResult],
) -> CoreResult<Vec<Record>> {
    let accepted: Vec<Record> = submitted
        .into_iter()
        .zip(items)
        .filter(|(_, item)| item.ok)
        .map(|(record, item)| merge(record, item))
        .collect();

    if !accepted.is_empty() {
        store.bulk_put(collection, accepted.clone()).await?;
        debug!(collection, records = accepted.len(), "mirrored writes");
    }
    Ok(accepted)
}

/// Removes every id the remote deleted and returns those ids.
async fn mirror_deletes(
    store: &dyn LocalStore,
    collection: &str,
    ids: &[String],
    items: &[ItemResult],
) -> CoreResult<Vec<String>> {
    let mut deleted = Vec::new();
    for (id, item) in ids.iter().zip(items) {
        if item.ok {
            store.delete(collection, id).await?;
            deleted.push(id.clone());
        }
    }
    debug!(collection, records = deleted.len(), "mirrored deletes");
    Ok(deleted)
}

/// Overlays the remote's copy onto the submitted attributes.
fn merge(mut submitted: Record, item: &ItemResult) -> Record {
    match &item.record {
        Some(remote) => submitted.extend(remote.clone()),
        None => {
            if let Some(id) = &item.id {
                submitted.insert("id".into(), id.clone());
            }
        }
    }
    normalize_record_id(&mut submitted);
    submitted
}

fn single<'r>(items: &'r [ItemResult], operation: &str) -> CoreResult<&'r ItemResult> {
    items.first().ok_or_else(|| {
        CoreError::Remote(RemoteError::MalformedResponse(format!(
            "no result for {operation}"
        )))
    })
}

fn to_record<T: Serialize>(entity: &T) -> CoreResult<Record> {
    match serde_json::to_value(entity)? {
        Value::Object(mut record) => {
            normalize_record_id(&mut record);
            Ok(record)
        }
        other => Err(CoreError::Codec(serde::de::Error::custom(format!(
            "entity must serialize to an object, got {other}"
        )))),
    }
}

fn from_record<T: DeserializeOwned>(record: Record) -> CoreResult<T> {
    Ok(serde_json::from_value(Value::Object(record))?)
}
