//! Dump command implementation.

use super::open_existing;
use lorekeep_storage::{record_id, LocalStore};
use std::path::Path;

/// Prints the records of one collection, one JSON object per line.
pub async fn run(
    path: &Path,
    collection: &str,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    if !store.collections().await?.iter().any(|c| c == collection) {
        return Err(format!("No collection named {collection:?} at {}", path.display()).into());
    }

    let records = store.get_all(collection).await?;
    let shown = limit.unwrap_or(records.len()).min(records.len());

    match format {
        "json" => {
            for record in &records[..shown] {
                println!("{}", serde_json::to_string(record)?);
            }
        }
        _ => {
            println!("{} ({} of {} records)", collection, shown, records.len());
            println!();
            for record in &records[..shown] {
                let id = record_id(record).unwrap_or("<no id>");
                let fields: Vec<_> = record
                    .iter()
                    .filter(|(key, _)| key.as_str() != "id")
                    .map(|(key, value)| format!("{key}={value}"))
                    .collect();
                println!("  {:<28} {}", id, fields.join(" "));
            }
        }
    }

    Ok(())
}
