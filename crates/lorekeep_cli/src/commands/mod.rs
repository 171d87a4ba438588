//! CLI command implementations.

pub mod destroy;
pub mod dump;
pub mod id;
pub mod inspect;
pub mod pull;

use lorekeep_storage::{FileStore, FileStoreConfig};
use std::path::Path;

/// Opens an existing store without creating one.
pub(crate) fn open_existing(path: &Path) -> Result<FileStore, Box<dyn std::error::Error>> {
    Ok(FileStore::open(
        path,
        FileStoreConfig::default().create_if_missing(false),
    )?)
}
