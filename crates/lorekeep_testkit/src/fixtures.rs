//! Test fixtures and backend helpers.
//!
//! Provides a reference backend wired to a sync context through the full
//! RPC path, with either an in-memory or a temporary on-disk store.

use async_trait::async_trait;
use lorekeep_core::{Repository, SyncConfig, SyncContext};
use lorekeep_protocol::Record;
use lorekeep_remote::{AuthProvider, Gateway, GatewayConfig, LoopbackClient, RpcGateway};
use lorekeep_server::{ServerConfig, TableServer};
use lorekeep_storage::{LocalStore, StoreLocation};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Secret used by authenticated test backends.
pub const TEST_SECRET: &[u8] = b"lorekeep-test-secret";

/// Signs in against a [`TableServer`] whenever a fresh credential is asked
/// for.
///
/// Clones share the same session.
#[derive(Clone)]
pub struct ServerAuth {
    server: Arc<TableServer>,
    token: Arc<Mutex<Option<String>>>,
    sign_ins: Arc<AtomicUsize>,
}

impl ServerAuth {
    /// Creates a provider with no credential yet.
    pub fn new(server: Arc<TableServer>) -> Self {
        Self {
            server,
            token: Arc::new(Mutex::new(None)),
            sign_ins: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns how many times a credential was issued.
    pub fn sign_ins(&self) -> usize {
        self.sign_ins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthProvider for ServerAuth {
    async fn credential(&self) -> Option<String> {
        self.token.lock().clone()
    }

    async fn refresh_credential(&self) -> Option<String> {
        // Unauthenticated servers accept anything.
        let token = self
            .server
            .issue_token([0x5Au8; 16])
            .unwrap_or_else(|_| "anonymous".to_string());
        self.sign_ins.fetch_add(1, Ordering::SeqCst);
        *self.token.lock() = Some(token.clone());
        Some(token)
    }
}

/// A reference backend plus a sync context talking to it.
pub struct TestBackend {
    /// The backend.
    pub server: Arc<TableServer>,
    /// The context under test.
    pub context: Arc<SyncContext>,
    /// The credential provider the gateway uses.
    pub auth: ServerAuth,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestBackend {
    /// Creates a backend with an in-memory store.
    pub async fn memory(collections: &[&str]) -> Self {
        Self::build(ServerConfig::default(), base_config(collections), None).await
    }

    /// Creates a backend with a store in a temporary directory.
    pub async fn file(collections: &[&str]) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = base_config(collections).with_store(store_location(temp_dir.path()));
        Self::build(ServerConfig::default(), config, Some(temp_dir)).await
    }

    /// Creates a backend that requires bearer tokens.
    pub async fn authenticated(collections: &[&str]) -> Self {
        let server_config = ServerConfig::default().with_auth(TEST_SECRET.to_vec());
        Self::build(server_config, base_config(collections), None).await
    }

    /// Creates a backend from explicit configurations.
    pub async fn with_config(server: ServerConfig, sync: SyncConfig) -> Self {
        Self::build(server, sync, None).await
    }

    async fn build(server: ServerConfig, sync: SyncConfig, temp_dir: Option<TempDir>) -> Self {
        let server = Arc::new(TableServer::new(server).expect("Failed to start test server"));
        let auth = ServerAuth::new(Arc::clone(&server));
        let context = SyncContext::open(sync, gateway(&server, &auth))
            .await
            .expect("Failed to open sync context");
        Self {
            server,
            context,
            auth,
            _temp_dir: temp_dir,
        }
    }

    /// Opens a second context on the same backend and store location.
    ///
    /// The current context must have been dropped first for on-disk stores,
    /// which are locked while open.
    pub async fn reopen(self) -> Self {
        let config = self.context.config().clone();
        let Self {
            server,
            context,
            auth,
            _temp_dir,
        } = self;
        drop(context);

        let context = SyncContext::open(config, gateway(&server, &auth))
            .await
            .expect("Failed to reopen sync context");
        Self {
            server,
            context,
            auth,
            _temp_dir,
        }
    }

    /// Returns the store directory if on disk.
    pub fn path(&self) -> Option<&Path> {
        self._temp_dir.as_ref().map(TempDir::path)
    }

    /// Returns a repository over `collection`.
    pub fn repository<T>(&self, collection: &str) -> Repository<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        Repository::new(Arc::clone(&self.context), collection)
    }

    /// Returns the open local store.
    pub async fn store(&self) -> Arc<dyn LocalStore> {
        self.context.store().await.expect("Store should be open")
    }

    /// Inserts rows on the backend as another client would.
    pub fn seed(&self, collection: &str, rows: Vec<Value>) {
        self.server
            .seed(collection, rows.into_iter().map(to_record).collect());
    }

    /// Returns the backend's rows of a collection.
    pub fn remote_rows(&self, collection: &str) -> Vec<Record> {
        self.server.tables().rows(collection)
    }
}

/// Converts a JSON object into a record.
///
/// # Panics
///
/// Panics if `value` is not an object.
pub fn to_record(value: Value) -> Record {
    match value {
        Value::Object(record) => record,
        other => panic!("expected an object, got {other}"),
    }
}

fn base_config(collections: &[&str]) -> SyncConfig {
    SyncConfig::new().with_collections(collections.iter().copied())
}

fn store_location(dir: &Path) -> StoreLocation {
    StoreLocation::Directory(dir.join("store"))
}

fn gateway(server: &Arc<TableServer>, auth: &ServerAuth) -> Arc<dyn Gateway> {
    Arc::new(RpcGateway::new(
        GatewayConfig::new("memory://backend"),
        LoopbackClient::new(Arc::clone(server)),
        auth.clone(),
    ))
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use serde_json::json;

    /// Creates a backend whose remote `collection` holds `count` rows with
    /// ids `"{collection}-{i}"`.
    pub async fn populated_backend(collection: &str, count: usize) -> TestBackend {
        let backend = TestBackend::memory(&[collection]).await;
        let rows = (0..count)
            .map(|i| json!({ "id": format!("{collection}-{i}"), "index": i }))
            .collect();
        backend.seed(collection, rows);
        backend
    }
}
