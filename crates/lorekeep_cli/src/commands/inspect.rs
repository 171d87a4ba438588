//! Inspect command implementation.

use super::open_existing;
use lorekeep_protocol::{MetadataRecord, METADATA_COLLECTION};
use lorekeep_storage::LocalStore;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Format version from the manifest.
    pub format_version: (u16, u16),
    /// Bytes on disk.
    pub disk_size: u64,
    /// Total records across collections.
    pub record_count: usize,
    /// Per-collection statistics.
    pub collections: Vec<CollectionStats>,
}

/// Statistics for a single collection.
#[derive(Debug, Serialize)]
pub struct CollectionStats {
    /// Collection name.
    pub name: String,
    /// Number of records.
    pub record_count: usize,
    /// Stamp recorded at the last refresh.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stamp: Option<String>,
}

/// Runs the inspect command.
pub async fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;

    let mut collections = Vec::new();
    for name in store.collections().await? {
        let record_count = store.get_all(&name).await?.len();
        let stamp = if name == METADATA_COLLECTION {
            None
        } else {
            store
                .get(METADATA_COLLECTION, &name)
                .await?
                .and_then(|r| MetadataRecord::from_record(&r).ok())
                .map(|m| m.last_modified_stamp)
        };
        collections.push(CollectionStats {
            name,
            record_count,
            stamp,
        });
    }

    let result = InspectResult {
        path: path.display().to_string(),
        format_version: store.format_version(),
        disk_size: dir_size(path)?,
        record_count: collections.iter().map(|c| c.record_count).sum(),
        collections,
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn dir_size(path: &Path) -> std::io::Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        total += if meta.is_dir() {
            dir_size(&entry.path())?
        } else {
            meta.len()
        };
    }
    Ok(total)
}

fn print_text_output(result: &InspectResult) {
    println!("Lorekeep Store Inspection");
    println!("=========================");
    println!();
    println!("Path:    {}", result.path);
    println!(
        "Format:  {}.{}",
        result.format_version.0, result.format_version.1
    );
    println!("Size:    {} bytes", format_size(result.disk_size));
    println!("Records: {}", result.record_count);
    println!();
    println!("Collections:");
    for c in &result.collections {
        match &c.stamp {
            Some(stamp) => println!("  {:<24} {:>8} records  stamp {}", c.name, c.record_count, stamp),
            None => println!("  {:<24} {:>8} records", c.name, c.record_count),
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(format_size(512), "512");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
