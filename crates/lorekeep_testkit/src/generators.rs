//! Property-based test generators using proptest.
//!
//! Provides strategies for generating records and write operations that
//! respect the id rules of the sync layer.

use lorekeep_protocol::Record;
use proptest::prelude::*;
use serde_json::{Map, Value};

/// Strategy for generating valid collection names.
///
/// Never yields the reserved metadata collection.
pub fn collection_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-zA-Z0-9_]{0,23}")
        .expect("Invalid regex")
        .prop_filter("Metadata is reserved", |s| s != "Metadata")
}

/// Strategy for generating record ids as stored locally.
pub fn record_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9][a-z0-9-]{0,15}").expect("Invalid regex")
}

/// Strategy for id values as a backend might return them.
///
/// Numbers, strings, nulls and missing ids all occur in practice.
pub fn id_value_strategy() -> impl Strategy<Value = Option<Value>> {
    prop_oneof![
        Just(None),
        Just(Some(Value::Null)),
        any::<u32>().prop_map(|n| Some(Value::from(n))),
        record_id_strategy().prop_map(|s| Some(Value::String(s))),
    ]
}

/// Strategy for non-id attribute values.
pub fn attribute_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::from),
        any::<i32>().prop_map(Value::from),
        "[a-zA-Z ]{0,16}".prop_map(Value::from),
        Just(Value::Null),
    ]
}

/// Strategy for attribute maps without an id.
pub fn attributes_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-z][a-z_]{0,9}", attribute_value_strategy(), 0..6).prop_map(
        |fields| {
            fields
                .into_iter()
                .filter(|(key, _)| key != "id")
                .collect()
        },
    )
}

/// Strategy for records carrying a string id.
pub fn record_strategy() -> impl Strategy<Value = Record> {
    (record_id_strategy(), attributes_strategy()).prop_map(|(id, mut fields)| {
        fields.insert("id".into(), Value::String(id));
        fields
    })
}

/// Strategy for a set of records with distinct ids.
pub fn record_set_strategy(max: usize) -> impl Strategy<Value = Vec<Record>> {
    prop::collection::btree_map(record_id_strategy(), attributes_strategy(), 0..max).prop_map(
        |rows| {
            rows.into_iter()
                .map(|(id, mut fields)| {
                    fields.insert("id".into(), Value::String(id));
                    fields
                })
                .collect()
        },
    )
}

/// A write issued against a repository.
#[derive(Debug, Clone)]
pub enum WriteOperation {
    /// Create a record with the given id.
    Create {
        /// Record id.
        id: String,
        /// Attributes.
        fields: Map<String, Value>,
    },
    /// Replace the attributes of a record.
    Update {
        /// Record id.
        id: String,
        /// Attributes.
        fields: Map<String, Value>,
    },
    /// Delete a record.
    Delete {
        /// Record id.
        id: String,
    },
}

impl WriteOperation {
    /// Returns the id this operation targets.
    pub fn id(&self) -> &str {
        match self {
            Self::Create { id, .. } | Self::Update { id, .. } | Self::Delete { id } => id,
        }
    }
}

/// Strategy for a single write over a small id space.
///
/// Ids collide often, so updates and deletes regularly hit existing rows.
pub fn write_operation_strategy() -> impl Strategy<Value = WriteOperation> {
    let id = (0u8..8).prop_map(|n| format!("row-{n}"));
    prop_oneof![
        (id.clone(), attributes_strategy())
            .prop_map(|(id, fields)| WriteOperation::Create { id, fields }),
        (id.clone(), attributes_strategy())
            .prop_map(|(id, fields)| WriteOperation::Update { id, fields }),
        id.prop_map(|id| WriteOperation::Delete { id }),
    ]
}

/// Strategy for a sequence of writes.
pub fn write_sequence_strategy(max: usize) -> impl Strategy<Value = Vec<WriteOperation>> {
    prop::collection::vec(write_operation_strategy(), 0..max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lorekeep_core::normalize_record_id;

    proptest! {
        #[test]
        fn collection_names_are_not_reserved(name in collection_name_strategy()) {
            prop_assert!(!name.is_empty());
            prop_assert_ne!(name, "Metadata");
        }

        #[test]
        fn records_keep_string_ids(record in record_strategy()) {
            let mut normalized = record.clone();
            normalize_record_id(&mut normalized);
            prop_assert_eq!(normalized, record);
        }

        #[test]
        fn record_sets_have_distinct_ids(rows in record_set_strategy(16)) {
            let mut ids: Vec<_> = rows.iter().map(|r| r["id"].as_str().unwrap().to_string()).collect();
            let len = ids.len();
            ids.dedup();
            prop_assert_eq!(ids.len(), len);
        }

        #[test]
        fn normalized_ids_are_strings_or_absent(id in id_value_strategy()) {
            let mut record = Record::new();
            if let Some(id) = id.clone() {
                record.insert("id".into(), id);
            }
            normalize_record_id(&mut record);
            match (id, record.get("id")) {
                (Some(Value::Number(n)), Some(Value::String(s))) => prop_assert_eq!(s, &n.to_string()),
                (Some(Value::String(a)), Some(Value::String(b))) => prop_assert_eq!(&a, b),
                (Some(Value::Null), Some(Value::Null)) | (None, None) => {}
                (before, after) => prop_assert!(false, "{:?} became {:?}", before, after),
            }
        }
    }
}
