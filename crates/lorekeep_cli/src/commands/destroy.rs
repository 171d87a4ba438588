//! Destroy command implementation.

use super::open_existing;
use lorekeep_storage::LocalStore;
use std::path::Path;

/// Erases the store at `path`.
///
/// Without `yes` only reports what would be removed.
pub async fn run(path: &Path, yes: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let collections = store.collections().await?;

    if !yes {
        println!(
            "Would destroy the store at {} ({} collections). Pass --yes to proceed.",
            path.display(),
            collections.len()
        );
        return Ok(());
    }

    store.destroy().await?;
    println!("Destroyed the store at {}", path.display());
    Ok(())
}
