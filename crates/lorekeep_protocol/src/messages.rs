//! RPC request messages.

use crate::batch::BatchEnvelope;
use crate::error::ProtocolResult;
use crate::Record;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Records grouped by collection name, as returned by read actions.
pub type Collections = BTreeMap<String, Vec<Record>>;

/// The operation an RPC call performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum RpcAction {
    /// Full scan of one or more collections.
    GetAll {
        /// Collections to scan.
        collections: Vec<String>,
    },
    /// Point fetch of ids, per collection.
    GetById {
        /// Ids to fetch, per collection.
        ids: BTreeMap<String, Vec<String>>,
    },
    /// Creates, updates and deletes in one round trip.
    Mutate(BatchEnvelope),
}

impl RpcAction {
    /// Returns the wire name of the action.
    pub fn name(&self) -> &'static str {
        match self {
            RpcAction::GetAll { .. } => "getAll",
            RpcAction::GetById { .. } => "getById",
            RpcAction::Mutate(_) => "mutate",
        }
    }
}

/// A complete RPC request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Bearer credential of the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    /// The operation and its fields.
    #[serde(flatten)]
    pub action: RpcAction,
}

impl RpcRequest {
    /// Creates a request without a credential.
    pub fn new(action: RpcAction) -> Self {
        Self {
            credential: None,
            action,
        }
    }

    /// Attaches a credential.
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Encodes to JSON bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Decodes a read response.
pub fn decode_collections(bytes: &[u8]) -> ProtocolResult<Collections> {
    Ok(serde_json::from_slice(bytes)?)
}
