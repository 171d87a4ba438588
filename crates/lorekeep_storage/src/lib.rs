//! # Lorekeep Storage
//!
//! Local collection store for Lorekeep.
//!
//! This crate provides the embedded, schema-free persistence that mirrors
//! remote collections on the device. A store is organized into named
//! collections, each holding records keyed by their `id` attribute.
//!
//! ## Design Principles
//!
//! - Records are opaque JSON objects; the store only reads their `id`
//! - One store instance backs every collection
//! - Collections are created on demand when a write targets a new name
//! - A single `put` or `bulk_put` is atomic; sequences of calls are not
//! - Must be `Send + Sync` for sharing across tasks
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] - For testing and ephemeral sessions
//! - [`FileStore`] - Persistent directory store with CBOR snapshots
//!
//! ## Example
//!
//! ```rust
//! use lorekeep_storage::{LocalStore, MemoryStore};
//! use serde_json::json;
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let store = MemoryStore::new();
//! let record = json!({ "id": "gob-1", "name": "Goblin" });
//! store.put("Bestiary", record.as_object().unwrap().clone()).await.unwrap();
//! let found = store.get("Bestiary", "gob-1").await.unwrap();
//! assert!(found.is_some());
//! # });
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod location;
mod manifest;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::{FileStore, FileStoreConfig};
pub use location::StoreLocation;
pub use manifest::{Manifest, MANIFEST_VERSION};
pub use memory::MemoryStore;
pub use store::{record_id, LocalStore, Record};
