//! # Lorekeep Protocol
//!
//! Wire types for the remote gateway's RPC endpoint.
//!
//! Every call is a single POST whose JSON body carries the credential, an
//! `action` tag and the action's fields:
//!
//! ```text
//! { "credential": "...", "action": "getAll",  "collections": ["Notes"] }
//! { "credential": "...", "action": "getById", "ids": { "Notes": ["n1"] } }
//! { "credential": "...", "action": "mutate",  "create": {...}, "updateById": {...}, "deleteById": {...} }
//! ```
//!
//! Reads answer with one key per requested collection. Mutations answer
//! with one key per operation kind, each mapping collection names to
//! per-item results carrying an `ok` flag.
//!
//! ## Reserved names
//!
//! The [`METADATA_COLLECTION`] holds one [`MetadataRecord`] per tracked
//! collection; its stamp changes whenever the collection changes.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod error;
mod messages;
mod metadata;

pub use batch::{BatchEnvelope, BatchResult, ItemResult};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{decode_collections, Collections, RpcAction, RpcRequest};
pub use metadata::{MetadataRecord, METADATA_COLLECTION};

/// A schema-free record: attribute name to JSON value.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Current wire protocol version, sent as a header by HTTP clients.
pub const PROTOCOL_VERSION: u16 = 1;
