//! # Lorekeep Core
//!
//! Local-first repositories over a remote tabular backend.
//!
//! This crate provides:
//! - [`Repository`]: remote-authoritative create/update/delete and batches,
//!   mirrored into the local store once the remote confirms them
//! - Cache-aside reads that answer locally and revalidate in the background
//! - [`Staleness`]: per-collection stamps that decide when a refresh is due
//! - [`IdGenerator`] and id normalization
//! - [`SyncContext`]: the store slot, gateway and configuration shared by
//!   every repository of an application
//!
//! ## Example
//!
//! ```rust
//! use lorekeep_core::{Repository, SyncConfig, SyncContext};
//! use lorekeep_remote::{GatewayConfig, LoopbackClient, RpcGateway, StaticCredential};
//! use lorekeep_server::{ServerConfig, TableServer};
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Monster {
//!     #[serde(default)]
//!     id: Option<String>,
//!     name: String,
//! }
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! # rt.block_on(async {
//! let server = Arc::new(TableServer::new(ServerConfig::default()).unwrap());
//! let gateway = Arc::new(RpcGateway::new(
//!     GatewayConfig::new("memory://backend"),
//!     LoopbackClient::new(server),
//!     StaticCredential::new("token"),
//! ));
//!
//! let config = SyncConfig::new().with_collection("Bestiary");
//! let context = SyncContext::open(config, gateway).await.unwrap();
//! let bestiary: Repository<Monster> = Repository::new(context, "Bestiary");
//!
//! let goblin = bestiary
//!     .create(&Monster { id: None, name: "Goblin".into() })
//!     .await
//!     .unwrap();
//! assert!(goblin.id.is_some());
//! assert_eq!(bestiary.get_local().await.unwrap().len(), 1);
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod context;
mod error;
pub mod id;
pub mod repository;
mod staleness;

pub use config::SyncConfig;
pub use context::{StoreSlot, SyncContext};
pub use error::{CoreError, CoreResult};
pub use id::{id_timestamp, normalize_id, normalize_record_id, IdGenerator};
pub use repository::{batch, BatchOutcome, LoadOrigin, Loaded, Repository, Revalidation};
pub use staleness::Staleness;
