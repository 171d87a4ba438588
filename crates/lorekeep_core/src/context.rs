//! The application-scoped sync context.

use crate::config::SyncConfig;
use crate::error::{CoreError, CoreResult};
use crate::id::IdGenerator;
use lorekeep_remote::Gateway;
use lorekeep_storage::{LocalStore, StoreLocation};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::info;

/// Holds the single live local store handle.
///
/// Opening is idempotent. Destroying erases the store and empties the
/// slot, after which every access fails with
/// [`CoreError::StoreUnavailable`] until the slot is opened again.
pub struct StoreSlot {
    location: StoreLocation,
    collections: Vec<String>,
    handle: tokio::sync::Mutex<Option<Arc<dyn LocalStore>>>,
}

impl StoreSlot {
    /// Creates an empty slot for a store at `location`.
    pub fn new(location: StoreLocation, collections: Vec<String>) -> Self {
        Self {
            location,
            collections,
            handle: tokio::sync::Mutex::new(None),
        }
    }

    /// Returns the store location.
    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Opens the store, or returns the handle that is already open.
    pub async fn open(&self) -> CoreResult<Arc<dyn LocalStore>> {
        let mut handle = self.handle.lock().await;
        if let Some(store) = handle.as_ref() {
            return Ok(Arc::clone(store));
        }

        let store = self.location.open(&self.collections).await?;
        info!(location = ?self.location, "local store opened");
        *handle = Some(Arc::clone(&store));
        Ok(store)
    }

    /// Returns the open handle.
    pub async fn current(&self) -> CoreResult<Arc<dyn LocalStore>> {
        self.handle
            .lock()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| CoreError::StoreUnavailable("store is not open".into()))
    }

    /// Returns true if a handle is open.
    pub async fn is_open(&self) -> bool {
        self.handle.lock().await.is_some()
    }

    /// Erases the store and empties the slot.
    ///
    /// A slot that is not open is opened first so that persistent data is
    /// erased too.
    pub async fn destroy(&self) -> CoreResult<()> {
        let mut handle = self.handle.lock().await;
        let store = match handle.take() {
            Some(store) => store,
            None => self.location.open(&self.collections).await?,
        };
        store.destroy().await?;
        info!(location = ?self.location, "local store destroyed");
        Ok(())
    }
}

/// Per-collection locks held across the clear and bulk write of a refresh.
#[derive(Default)]
struct RefreshLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RefreshLocks {
    async fn acquire(&self, collection: &str) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.lock().entry(collection.to_string()).or_default());
        lock.lock_owned().await
    }
}

/// Everything repositories share: the store slot, the gateway, the id
/// generator, the refresh locks and the configuration.
///
/// Build one per application and hand it to every
/// [`Repository`](crate::Repository).
pub struct SyncContext {
    config: SyncConfig,
    slot: StoreSlot,
    gateway: Arc<dyn Gateway>,
    ids: IdGenerator,
    refreshes: RefreshLocks,
}

impl SyncContext {
    /// Creates a context without opening the store.
    pub fn new(config: SyncConfig, gateway: Arc<dyn Gateway>) -> Self {
        let slot = StoreSlot::new(config.store.clone(), config.tracked_collections());
        Self {
            config,
            slot,
            gateway,
            ids: IdGenerator::new(),
            refreshes: RefreshLocks::default(),
        }
    }

    /// Creates a context and opens its store.
    pub async fn open(config: SyncConfig, gateway: Arc<dyn Gateway>) -> CoreResult<Arc<Self>> {
        let context = Self::new(config, gateway);
        context.slot.open().await?;
        Ok(Arc::new(context))
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the store slot.
    pub fn slot(&self) -> &StoreSlot {
        &self.slot
    }

    /// Returns the open local store.
    pub async fn store(&self) -> CoreResult<Arc<dyn LocalStore>> {
        self.slot.current().await
    }

    /// Returns the remote gateway.
    pub fn gateway(&self) -> &dyn Gateway {
        self.gateway.as_ref()
    }

    /// Returns the id generator.
    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    /// Returns the reserved metadata collection name.
    pub fn metadata_collection(&self) -> &str {
        &self.config.metadata_collection
    }

    /// Takes the refresh lock of a collection, if refreshes are serialized.
    pub(crate) async fn refresh_guard(&self, collection: &str) -> Option<OwnedMutexGuard<()>> {
        if self.config.serialize_refreshes {
            Some(self.refreshes.acquire(collection).await)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lorekeep_remote::{GatewayConfig, LoopbackClient, RpcGateway, StaticCredential};
    use lorekeep_server::{ServerConfig, TableServer};
    use serde_json::json;
    use std::time::Duration;

    fn gateway() -> Arc<dyn Gateway> {
        let server = Arc::new(TableServer::new(ServerConfig::default()).unwrap());
        Arc::new(RpcGateway::new(
            GatewayConfig::new("memory://backend"),
            LoopbackClient::new(server),
            StaticCredential::new("t"),
        ))
    }

    #[tokio::test]
    async fn open_is_idempotent() {
        let slot = StoreSlot::new(StoreLocation::Memory, vec!["Notes".into()]);
        let a = slot.open().await.unwrap();
        a.put("Notes", json!({ "id": "n1" }).as_object().cloned().unwrap())
            .await
            .unwrap();

        let b = slot.open().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(b.get("Notes", "n1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn destroy_fails_closed_until_reopened() {
        let slot = StoreSlot::new(StoreLocation::Memory, vec!["Notes".into()]);
        let old = slot.open().await.unwrap();
        slot.destroy().await.unwrap();

        assert!(!slot.is_open().await);
        assert!(slot.current().await.err().unwrap().is_store_unavailable());

        // A handle obtained before destroy is closed as well.
        let err: CoreError = old.get_all("Notes").await.unwrap_err().into();
        assert!(err.is_store_unavailable());

        let fresh = slot.open().await.unwrap();
        assert!(fresh.get_all("Notes").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn destroy_erases_unopened_directory() {
        let dir = tempfile::tempdir().unwrap();
        let location = StoreLocation::Directory(dir.path().join("cache"));
        {
            let slot = StoreSlot::new(location.clone(), vec!["Notes".into()]);
            let store = slot.open().await.unwrap();
            store
                .put("Notes", json!({ "id": "n1" }).as_object().cloned().unwrap())
                .await
                .unwrap();
        }

        let slot = StoreSlot::new(location.clone(), vec!["Notes".into()]);
        slot.destroy().await.unwrap();
        let store = slot.open().await.unwrap();
        assert!(store.get_all("Notes").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn context_opens_tracked_collections() {
        let config = SyncConfig::new().with_collection("Bestiary");
        let context = SyncContext::open(config, gateway()).await.unwrap();

        let store = context.store().await.unwrap();
        assert_eq!(
            store.collections().await.unwrap(),
            vec!["Bestiary", "Metadata"]
        );
        assert_eq!(context.metadata_collection(), "Metadata");
    }

    #[tokio::test]
    async fn unopened_context_has_no_store() {
        let context = SyncContext::new(SyncConfig::new(), gateway());
        assert!(context.store().await.err().unwrap().is_store_unavailable());
    }

    #[tokio::test]
    async fn refresh_guard_serializes_per_collection() {
        let context = Arc::new(SyncContext::new(SyncConfig::new(), gateway()));
        let held = context.refresh_guard("Notes").await;
        assert!(held.is_some());

        // Another collection is independent.
        assert!(context.refresh_guard("Bestiary").await.is_some());

        let waiter = {
            let context = Arc::clone(&context);
            tokio::spawn(async move { context.refresh_guard("Notes").await.is_some() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn refresh_guard_can_be_disabled() {
        let config = SyncConfig::new().with_serialize_refreshes(false);
        let context = SyncContext::new(config, gateway());
        let _held = context.refresh_guard("Notes").await;
        assert!(context.refresh_guard("Notes").await.is_none());
    }
}
