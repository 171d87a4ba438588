//! Server-side tables.

use lorekeep_protocol::{
    BatchEnvelope, BatchResult, Collections, ItemResult, MetadataRecord, Record,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;

/// One table: rows keyed by the text of their id.
#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<String, Record>,
    next_row: u64,
}

impl Table {
    fn take_row(&mut self) -> u64 {
        // Row 1 is the header of a tabular sheet.
        self.next_row = self.next_row.max(1) + 1;
        self.next_row
    }
}

#[derive(Debug, Default)]
struct Inner {
    tables: BTreeMap<String, Table>,
    stamps: BTreeMap<String, String>,
    revision: u64,
    next_id: u64,
}

impl Inner {
    fn touch(&mut self, collection: &str) {
        self.revision += 1;
        self.stamps
            .insert(collection.to_string(), format!("r{}", self.revision));
    }

    fn assign_id(&mut self, table: &str) -> u64 {
        loop {
            self.next_id += 1;
            let taken = self
                .tables
                .get(table)
                .is_some_and(|t| t.rows.contains_key(&self.next_id.to_string()));
            if !taken {
                return self.next_id;
            }
        }
    }
}

/// The backend's data: named tables plus the stamp table.
///
/// The stamp of a collection changes on every mutation that succeeds
/// against it. Collections never mutated have no stamp at all.
pub struct Tables {
    metadata_collection: String,
    inner: RwLock<Inner>,
}

impl Tables {
    /// Creates empty tables.
    pub fn new(metadata_collection: impl Into<String>) -> Self {
        Self {
            metadata_collection: metadata_collection.into(),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Returns the name of the stamp table.
    pub fn metadata_collection(&self) -> &str {
        &self.metadata_collection
    }

    /// Full scan of the given collections.
    ///
    /// Every requested name is answered, unknown ones with no rows.
    pub fn get_all(&self, collections: &[String]) -> Collections {
        let inner = self.inner.read();
        collections
            .iter()
            .map(|name| {
                let rows = if *name == self.metadata_collection {
                    metadata_rows(&inner.stamps, |_| true)
                } else {
                    inner
                        .tables
                        .get(name)
                        .map(|t| t.rows.values().cloned().collect())
                        .unwrap_or_default()
                };
                (name.clone(), rows)
            })
            .collect()
    }

    /// Point fetch. Ids that do not exist are left out of the answer.
    pub fn get_by_id(&self, ids: &BTreeMap<String, Vec<String>>) -> Collections {
        let inner = self.inner.read();
        ids.iter()
            .map(|(name, wanted)| {
                let rows = if *name == self.metadata_collection {
                    metadata_rows(&inner.stamps, |id| wanted.iter().any(|w| w == id))
                } else {
                    inner
                        .tables
                        .get(name)
                        .map(|t| {
                            wanted
                                .iter()
                                .filter_map(|id| t.rows.get(id).cloned())
                                .collect()
                        })
                        .unwrap_or_default()
                };
                (name.clone(), rows)
            })
            .collect()
    }

    /// Applies every item of the envelope independently.
    pub fn apply(&self, envelope: BatchEnvelope) -> BatchResult {
        let mut inner = self.inner.write();
        let mut result = BatchResult::default();

        for (name, records) in envelope.create {
            let items = records
                .into_iter()
                .map(|record| self.create(&mut inner, &name, record))
                .collect();
            result.create.insert(name, items);
        }

        for (name, records) in envelope.update_by_id {
            let items = records
                .into_iter()
                .map(|record| self.update(&mut inner, &name, record))
                .collect();
            result.update_by_id.insert(name, items);
        }

        for (name, ids) in envelope.delete_by_id {
            let items = ids
                .into_iter()
                .map(|id| self.delete(&mut inner, &name, id))
                .collect();
            result.delete_by_id.insert(name, items);
        }

        result
    }

    fn create(&self, inner: &mut Inner, name: &str, mut record: Record) -> ItemResult {
        if name == self.metadata_collection {
            return reserved(record.get("id").cloned());
        }

        let key = match record.get("id") {
            None | Some(Value::Null) => {
                let id = inner.assign_id(name);
                record.insert("id".into(), Value::from(id));
                id.to_string()
            }
            Some(value) => match key_of(value) {
                Some(key) => key,
                None => return ItemResult::rejected(Some(value.clone()), "unusable id"),
            },
        };

        let table = inner.tables.entry(name.to_string()).or_default();
        if table.rows.contains_key(&key) {
            return ItemResult::rejected(record.get("id").cloned(), "duplicate id");
        }

        record.insert("row".into(), Value::from(table.take_row()));
        table.rows.insert(key, record.clone());
        inner.touch(name);
        ItemResult::applied(record)
    }

    fn update(&self, inner: &mut Inner, name: &str, record: Record) -> ItemResult {
        let id = record.get("id").cloned();
        if name == self.metadata_collection {
            return reserved(id);
        }

        let Some(key) = id.as_ref().and_then(key_of) else {
            return ItemResult::rejected(id, "update without id");
        };
        let Some(row) = inner.tables.get_mut(name).and_then(|t| t.rows.get_mut(&key)) else {
            return ItemResult::rejected(id, "no such row");
        };

        for (field, value) in record {
            // The stored id keeps its original type.
            if field != "id" {
                row.insert(field, value);
            }
        }
        let merged = row.clone();
        inner.touch(name);
        ItemResult::applied(merged)
    }

    fn delete(&self, inner: &mut Inner, name: &str, id: String) -> ItemResult {
        if name == self.metadata_collection {
            return reserved(Some(Value::String(id)));
        }

        let removed = inner
            .tables
            .get_mut(name)
            .and_then(|t| t.rows.remove(&id))
            .is_some();
        if !removed {
            return ItemResult::rejected(Some(Value::String(id)), "no such row");
        }

        inner.touch(name);
        ItemResult::deleted(id)
    }

    /// Inserts rows directly, as another client would, and changes the stamp.
    ///
    /// Rows without an id are skipped.
    pub fn seed(&self, collection: &str, records: Vec<Record>) {
        let mut inner = self.inner.write();
        let table = inner.tables.entry(collection.to_string()).or_default();
        for record in records {
            if let Some(key) = record.get("id").and_then(key_of) {
                table.rows.insert(key, record);
            }
        }
        inner.touch(collection);
    }

    /// Changes the stamp of a collection without touching its rows.
    pub fn touch(&self, collection: &str) {
        self.inner.write().touch(collection);
    }

    /// Removes the stamp of a collection.
    pub fn clear_stamp(&self, collection: &str) {
        self.inner.write().stamps.remove(collection);
    }

    /// Returns the current stamp of a collection.
    pub fn stamp(&self, collection: &str) -> Option<String> {
        self.inner.read().stamps.get(collection).cloned()
    }

    /// Returns every row of a collection.
    pub fn rows(&self, collection: &str) -> Vec<Record> {
        self.inner
            .read()
            .tables
            .get(collection)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default()
    }
}

fn metadata_rows(stamps: &BTreeMap<String, String>, keep: impl Fn(&str) -> bool) -> Vec<Record> {
    stamps
        .iter()
        .filter(|(name, _)| keep(name))
        .map(|(name, stamp)| MetadataRecord::new(name.clone(), stamp.clone()).into_record())
        .collect()
}

fn reserved(id: Option<Value>) -> ItemResult {
    ItemResult::rejected(id, "metadata is maintained by the server")
}

/// The text under which an id is stored.
fn key_of(id: &Value) -> Option<String> {
    match id {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn tables() -> Tables {
        Tables::new("Metadata")
    }

    #[test]
    fn create_assigns_numeric_id_and_row() {
        let tables = tables();
        let result = tables.apply(
            BatchEnvelope::new().with_create("Notes", vec![record(json!({ "text": "hi" }))]),
        );

        let item = &result.created("Notes")[0];
        assert!(item.ok);
        let stored = item.record.as_ref().unwrap();
        assert_eq!(stored["id"], json!(1));
        assert_eq!(stored["row"], json!(2));
        assert_eq!(stored["text"], "hi");
    }

    #[test]
    fn create_keeps_client_id_and_rejects_duplicates() {
        let tables = tables();
        let note = record(json!({ "id": "n1", "text": "hi" }));
        let first = tables.apply(BatchEnvelope::new().with_create("Notes", vec![note.clone()]));
        let second = tables.apply(BatchEnvelope::new().with_create("Notes", vec![note]));

        assert!(first.all_ok());
        assert_eq!(second.created("Notes")[0].reason(), "duplicate id");
        assert_eq!(tables.rows("Notes").len(), 1);
    }

    #[test]
    fn every_successful_mutation_changes_the_stamp() {
        let tables = tables();
        assert_eq!(tables.stamp("Notes"), None);

        tables.apply(BatchEnvelope::new().with_create("Notes", vec![record(json!({ "id": "a" }))]));
        let after_create = tables.stamp("Notes").unwrap();

        tables.apply(BatchEnvelope::new().with_update("Notes", vec![record(json!({ "id": "a", "x": 1 }))]));
        let after_update = tables.stamp("Notes").unwrap();
        assert_ne!(after_create, after_update);

        // A rejected item changes nothing.
        tables.apply(BatchEnvelope::new().with_delete("Notes", vec!["zzz".into()]));
        assert_eq!(tables.stamp("Notes").unwrap(), after_update);
    }

    #[test]
    fn update_merges_and_unknown_ids_fail() {
        let tables = tables();
        tables.seed("Characters", vec![record(json!({ "id": "c1", "name": "Ada", "hp": 9 }))]);

        let result = tables.apply(BatchEnvelope::new().with_update(
            "Characters",
            vec![
                record(json!({ "id": "c1", "hp": 4 })),
                record(json!({ "id": "c9", "hp": 1 })),
                record(json!({ "hp": 1 })),
            ],
        ));

        let items = result.updated("Characters");
        assert_eq!(items[0].record.as_ref().unwrap()["name"], "Ada");
        assert_eq!(items[0].record.as_ref().unwrap()["hp"], 4);
        assert_eq!(items[1].reason(), "no such row");
        assert_eq!(items[2].reason(), "update without id");
    }

    #[test]
    fn delete_of_missing_row_is_rejected() {
        let tables = tables();
        tables.seed("Notes", vec![record(json!({ "id": "n1" }))]);

        let result = tables.apply(
            BatchEnvelope::new().with_delete("Notes", vec!["n1".into(), "n1".into()]),
        );
        let items = result.deleted("Notes");
        assert!(items[0].ok);
        assert!(!items[1].ok);
        assert!(tables.rows("Notes").is_empty());
    }

    #[test]
    fn metadata_is_read_only_and_readable() {
        let tables = tables();
        tables.seed("Notes", vec![record(json!({ "id": "n1" }))]);

        let result = tables.apply(
            BatchEnvelope::new().with_create("Metadata", vec![record(json!({ "id": "Notes" }))]),
        );
        assert!(!result.all_ok());

        let all = tables.get_all(&["Notes".into(), "Metadata".into(), "Nope".into()]);
        assert_eq!(all["Notes"].len(), 1);
        assert_eq!(all["Metadata"][0]["id"], "Notes");
        assert!(all["Nope"].is_empty());

        let point = tables.get_by_id(&BTreeMap::from([(
            "Metadata".to_string(),
            vec!["Notes".to_string(), "Other".to_string()],
        )]));
        assert_eq!(point["Metadata"].len(), 1);
        assert_eq!(
            point["Metadata"][0]["lastModifiedStamp"],
            json!(tables.stamp("Notes").unwrap())
        );
    }

    #[test]
    fn numeric_ids_are_fetched_by_text() {
        let tables = tables();
        tables.apply(BatchEnvelope::new().with_create("Notes", vec![record(json!({ "t": 1 }))]));

        let point = tables.get_by_id(&BTreeMap::from([("Notes".to_string(), vec!["1".to_string()])]));
        assert_eq!(point["Notes"][0]["id"], json!(1));
    }

    #[test]
    fn touch_and_clear_stamp() {
        let tables = tables();
        tables.touch("Spells");
        let first = tables.stamp("Spells").unwrap();
        tables.touch("Spells");
        assert_ne!(tables.stamp("Spells").unwrap(), first);

        tables.clear_stamp("Spells");
        assert_eq!(tables.stamp("Spells"), None);
    }
}
