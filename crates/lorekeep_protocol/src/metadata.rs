//! Staleness stamps for tracked collections.

use crate::error::{ProtocolError, ProtocolResult};
use crate::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved collection holding one stamp record per tracked collection.
pub const METADATA_COLLECTION: &str = "Metadata";

/// The last-modified stamp of one collection.
///
/// Only meaningful for comparing against another stamp of the same
/// collection; it carries no data about the collection's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    /// The collection name, which is also the record's id.
    pub id: String,
    /// Opaque stamp that changes whenever the collection changes.
    pub last_modified_stamp: String,
}

impl MetadataRecord {
    /// Creates a metadata record.
    pub fn new(collection: impl Into<String>, stamp: impl Into<String>) -> Self {
        Self {
            id: collection.into(),
            last_modified_stamp: stamp.into(),
        }
    }

    /// Returns the collection this stamp belongs to.
    pub fn collection(&self) -> &str {
        &self.id
    }

    /// Reads a metadata record from a raw record.
    ///
    /// Backends may store the stamp as a number; it is read back as its
    /// decimal text.
    pub fn from_record(record: &Record) -> ProtocolResult<Self> {
        let id = text(record.get("id")).ok_or_else(|| ProtocolError::missing("id", "metadata"))?;
        let last_modified_stamp = text(record.get("lastModifiedStamp"))
            .ok_or_else(|| ProtocolError::missing("lastModifiedStamp", format!("metadata {id}")))?;
        Ok(Self {
            id,
            last_modified_stamp,
        })
    }

    /// Converts into a raw record.
    pub fn into_record(self) -> Record {
        let mut record = Record::new();
        record.insert("id".into(), Value::String(self.id));
        record.insert(
            "lastModifiedStamp".into(),
            Value::String(self.last_modified_stamp),
        );
        record
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
