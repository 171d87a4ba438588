//! Staleness detection through per-collection stamps.
//!
//! The remote keeps one record per collection in the metadata collection;
//! its stamp changes whenever the collection changes. The local store keeps
//! the stamp seen at the last full refresh. A collection is stale when the
//! two differ, or when there is no local stamp at all.

use crate::context::SyncContext;
use crate::error::CoreResult;
use lorekeep_protocol::{MetadataRecord, Record};
use std::collections::BTreeMap;
use tracing::debug;

/// Compares local and remote stamps for a [`SyncContext`].
pub struct Staleness<'a> {
    context: &'a SyncContext,
}

impl<'a> Staleness<'a> {
    /// Creates a checker over a context.
    pub fn new(context: &'a SyncContext) -> Self {
        Self { context }
    }

    /// Returns true if the local copy of `collection` may differ from the
    /// remote one.
    ///
    /// Reads only. A missing local stamp answers without a remote call.
    pub async fn is_stale(&self, collection: &str) -> CoreResult<bool> {
        let Some(local) = self.local_stamp(collection).await? else {
            debug!(collection, "no local stamp, collection is stale");
            return Ok(true);
        };

        let remote = self.remote_stamp(collection).await?;
        let stale = remote.as_ref().map(|r| &r.last_modified_stamp) != Some(&local.last_modified_stamp);
        debug!(
            collection,
            local = %local.last_modified_stamp,
            remote = remote.as_ref().map(|r| r.last_modified_stamp.as_str()).unwrap_or("<none>"),
            stale,
            "compared stamps"
        );
        Ok(stale)
    }

    /// Returns the stamp recorded at the last refresh.
    ///
    /// An unreadable local record counts as absent.
    pub async fn local_stamp(&self, collection: &str) -> CoreResult<Option<MetadataRecord>> {
        let store = self.context.store().await?;
        let record = store
            .get(self.context.metadata_collection(), collection)
            .await?;
        Ok(record.and_then(|r| MetadataRecord::from_record(&r).ok()))
    }

    /// Point-fetches the remote stamp.
    pub async fn remote_stamp(&self, collection: &str) -> CoreResult<Option<MetadataRecord>> {
        let metadata = self.context.metadata_collection();
        let ids = BTreeMap::from([(metadata.to_string(), vec![collection.to_string()])]);
        let mut fetched = self.context.gateway().get_by_id(ids).await?;
        let rows = fetched.remove(metadata).unwrap_or_default();
        Ok(find_stamp(&rows, collection))
    }

    /// Records the stamp that came with a full refresh as the new baseline.
    ///
    /// If `metadata_rows` has no stamp for the collection the local one is
    /// removed, so the collection stays stale.
    pub async fn record_baseline(&self, collection: &str, metadata_rows: &[Record]) -> CoreResult<()> {
        let store = self.context.store().await?;
        let metadata = self.context.metadata_collection();
        match find_stamp(metadata_rows, collection) {
            Some(stamp) => {
                debug!(collection, stamp = %stamp.last_modified_stamp, "recording stamp");
                store.put(metadata, stamp.into_record()).await?;
            }
            None => {
                debug!(collection, "remote has no stamp, clearing local one");
                store.delete(metadata, collection).await?;
            }
        }
        Ok(())
    }
}

fn find_stamp(rows: &[Record], collection: &str) -> Option<MetadataRecord> {
    rows.iter()
        .filter_map(|r| MetadataRecord::from_record(r).ok())
        .find(|m| m.collection() == collection)
}
