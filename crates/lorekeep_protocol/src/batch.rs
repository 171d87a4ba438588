//! Multi-collection mutation envelopes and their results.

use crate::error::ProtocolResult;
use crate::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// A bundle of creates, updates and deletes across any number of
/// collections, executed by the remote in one round trip.
///
/// One round trip is not a transaction: the backend may apply each item
/// independently, and the [`BatchResult`] reports every item on its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEnvelope {
    /// Records to create, per collection.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub create: BTreeMap<String, Vec<Record>>,
    /// Records to update by their id, per collection.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub update_by_id: BTreeMap<String, Vec<Record>>,
    /// Ids to delete, per collection.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub delete_by_id: BTreeMap<String, Vec<String>>,
}

impl BatchEnvelope {
    /// Creates an empty envelope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds records to create in a collection.
    pub fn with_create(mut self, collection: impl Into<String>, records: Vec<Record>) -> Self {
        self.create.entry(collection.into()).or_default().extend(records);
        self
    }

    /// Adds records to update in a collection.
    pub fn with_update(mut self, collection: impl Into<String>, records: Vec<Record>) -> Self {
        self.update_by_id
            .entry(collection.into())
            .or_default()
            .extend(records);
        self
    }

    /// Adds ids to delete from a collection.
    pub fn with_delete(mut self, collection: impl Into<String>, ids: Vec<String>) -> Self {
        self.delete_by_id
            .entry(collection.into())
            .or_default()
            .extend(ids);
        self
    }

    /// Returns true if the envelope holds no items.
    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }

    /// Returns the total number of items across all kinds and collections.
    pub fn item_count(&self) -> usize {
        self.create.values().map(Vec::len).sum::<usize>()
            + self.update_by_id.values().map(Vec::len).sum::<usize>()
            + self.delete_by_id.values().map(Vec::len).sum::<usize>()
    }

    /// Returns every collection the envelope touches.
    pub fn collections(&self) -> BTreeSet<&str> {
        self.create
            .keys()
            .chain(self.update_by_id.keys())
            .chain(self.delete_by_id.keys())
            .map(String::as_str)
            .collect()
    }
}

/// The outcome of one item of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    /// Whether the backend applied the item.
    pub ok: bool,
    /// The item's id as the backend reports it. May be a number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// The backend's canonical copy of the record, on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<Record>,
    /// Why the item failed, on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemResult {
    /// A successful create or update carrying the canonical record.
    pub fn applied(record: Record) -> Self {
        Self {
            ok: true,
            id: record.get("id").cloned(),
            record: Some(record),
            error: None,
        }
    }

    /// A successful delete.
    pub fn deleted(id: impl Into<Value>) -> Self {
        Self {
            ok: true,
            id: Some(id.into()),
            record: None,
            error: None,
        }
    }

    /// A rejected item.
    pub fn rejected(id: Option<Value>, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            record: None,
            error: Some(error.into()),
        }
    }

    /// Returns the failure description, or a generic one if none was sent.
    pub fn reason(&self) -> &str {
        self.error.as_deref().unwrap_or("rejected by remote")
    }
}

/// Per-item results of a [`BatchEnvelope`], in the same shape.
///
/// Within each collection, results are positionally aligned with the
/// submitted items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    /// Results of creates, per collection.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub create: BTreeMap<String, Vec<ItemResult>>,
    /// Results of updates, per collection.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub update_by_id: BTreeMap<String, Vec<ItemResult>>,
    /// Results of deletes, per collection.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub delete_by_id: BTreeMap<String, Vec<ItemResult>>,
}

impl BatchResult {
    /// Decodes a batch result from JSON bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Returns the create results of a collection.
    pub fn created(&self, collection: &str) -> &[ItemResult] {
        self.create.get(collection).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the update results of a collection.
    pub fn updated(&self, collection: &str) -> &[ItemResult] {
        self.update_by_id.get(collection).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the delete results of a collection.
    pub fn deleted(&self, collection: &str) -> &[ItemResult] {
        self.delete_by_id.get(collection).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates over every item result of every kind.
    pub fn items(&self) -> impl Iterator<Item = &ItemResult> {
        self.create
            .values()
            .chain(self.update_by_id.values())
            .chain(self.delete_by_id.values())
            .flatten()
    }

    /// Returns the number of rejected items.
    pub fn failure_count(&self) -> usize {
        self.items().filter(|item| !item.ok).count()
    }

    /// Returns true if every item was applied.
    pub fn all_ok(&self) -> bool {
        self.failure_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn envelope_builder() {
        let envelope = BatchEnvelope::new()
            .with_update("Inventory", vec![record(json!({ "id": "gold", "qty": 10 }))])
            .with_create("BattleLog", vec![record(json!({ "entry": "bought rope" }))])
            .with_delete("Inventory", vec!["rope".into()]);

        assert_eq!(envelope.item_count(), 3);
        assert!(!envelope.is_empty());
        assert_eq!(
            envelope.collections().into_iter().collect::<Vec<_>>(),
            vec!["BattleLog", "Inventory"]
        );
    }

    #[test]
    fn envelope_wire_shape_skips_empty_kinds() {
        let envelope = BatchEnvelope::new().with_delete("Notes", vec!["n1".into()]);
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value, json!({ "deleteById": { "Notes": ["n1"] } }));
    }

    #[test]
    fn result_counts_failures() {
        let result = BatchResult {
            update_by_id: BTreeMap::from([(
                "Characters".to_string(),
                vec![
                    ItemResult::applied(record(json!({ "id": "a" }))),
                    ItemResult::rejected(Some(json!("b")), "no such row"),
                    ItemResult::applied(record(json!({ "id": "c" }))),
                ],
            )]),
            ..BatchResult::default()
        };

        assert_eq!(result.failure_count(), 1);
        assert!(!result.all_ok());
        assert_eq!(result.updated("Characters")[1].reason(), "no such row");
        assert!(result.created("Characters").is_empty());
    }

    #[test]
    fn result_decodes_numeric_ids() {
        let bytes = br#"{"create":{"Notes":[{"ok":true,"id":4,"record":{"id":4,"row":4}}]}}"#;
        let result = BatchResult::decode(bytes).unwrap();
        let item = &result.created("Notes")[0];
        assert!(item.ok);
        assert_eq!(item.id, Some(json!(4)));
        assert_eq!(item.reason(), "rejected by remote");
    }

    mod properties {
        use super::*;
        use crate::messages::{RpcAction, RpcRequest};
        use proptest::prelude::*;

        fn records() -> impl Strategy<Value = Vec<Record>> {
            prop::collection::vec(
                ("[a-z0-9]{1,8}", any::<i32>())
                    .prop_map(|(id, n)| record(json!({ "id": id, "n": n }))),
                0..4,
            )
        }

        fn envelope() -> impl Strategy<Value = BatchEnvelope> {
            (
                prop::collection::btree_map("[A-Z][a-z]{0,6}", records(), 0..3),
                prop::collection::btree_map("[A-Z][a-z]{0,6}", records(), 0..3),
                prop::collection::btree_map(
                    "[A-Z][a-z]{0,6}",
                    prop::collection::vec("[a-z0-9]{1,8}", 0..4),
                    0..3,
                ),
            )
                .prop_map(|(create, update_by_id, delete_by_id)| BatchEnvelope {
                    create,
                    update_by_id,
                    delete_by_id,
                })
        }

        proptest! {
            #[test]
            fn item_count_sums_every_kind(envelope in envelope()) {
                let expected: usize = envelope.create.values().map(Vec::len).sum::<usize>()
                    + envelope.update_by_id.values().map(Vec::len).sum::<usize>()
                    + envelope.delete_by_id.values().map(Vec::len).sum::<usize>();
                prop_assert_eq!(envelope.item_count(), expected);
                prop_assert_eq!(envelope.is_empty(), expected == 0);
            }

            #[test]
            fn mutate_request_survives_the_wire(envelope in envelope(), token in "[a-zA-Z0-9]{0,12}") {
                let request = RpcRequest::new(RpcAction::Mutate(envelope)).with_credential(token);
                let decoded = RpcRequest::decode(&request.encode().unwrap()).unwrap();
                prop_assert_eq!(decoded, request);
            }
        }
    }
}
