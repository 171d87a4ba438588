//! File-based store for persistent storage.

use crate::error::{StorageError, StorageResult};
use crate::manifest::{Manifest, MANIFEST_VERSION};
use crate::store::{keyed, LocalStore, Record};
use async_trait::async_trait;
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::NamedTempFile;
use tracing::{debug, info};

const MANIFEST_FILE: &str = "MANIFEST";
const LOCK_FILE: &str = "LOCK";
const COLLECTIONS_DIR: &str = "collections";

/// Configuration for opening a [`FileStore`].
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,
    /// Format version to use for new stores.
    pub format_version: (u16, u16),
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            format_version: (MANIFEST_VERSION, 0),
        }
    }
}

impl FileStoreConfig {
    /// Sets whether to create the store if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }
}

type Snapshot = BTreeMap<String, Record>;

#[derive(Debug, Default)]
struct State {
    manifest: Manifest,
    collections: HashMap<String, Snapshot>,
}

/// Bytes to write after an in-memory mutation.
struct Flush {
    manifest: Option<Vec<u8>>,
    snapshot: Option<(String, Vec<u8>)>,
}

/// A directory-backed store.
///
/// Each collection is kept in memory and mirrored to a CBOR snapshot file
/// under `collections/`. Every mutation rewrites the affected snapshot
/// through a temporary file and an atomic rename, so a crash leaves either
/// the old or the new snapshot on disk, never a torn one.
///
/// # Layout
///
/// ```text
/// <root>/MANIFEST                  CBOR manifest (format version, registry)
/// <root>/LOCK                      exclusive advisory lock
/// <root>/collections/<hex>.cbor    one snapshot per collection
/// ```
///
/// # Thread Safety
///
/// Mutations are serialized per store. Reads are served from memory and
/// never wait for disk.
///
/// # Example
///
/// ```no_run
/// use lorekeep_storage::{FileStore, FileStoreConfig};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("campaign-cache"), FileStoreConfig::default()).unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    state: RwLock<State>,
    io: tokio::sync::Mutex<()>,
    lock: Mutex<Option<File>>,
    closed: AtomicBool,
}

impl FileStore {
    /// Opens or creates a store at the given directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Unavailable`] if the directory cannot be
    /// created, does not exist and `create_if_missing` is off, or is locked
    /// by another process. Returns [`StorageError::Corrupted`] if the
    /// manifest or a snapshot cannot be decoded.
    pub fn open(root: &Path, config: FileStoreConfig) -> StorageResult<Self> {
        if !root.exists() && !config.create_if_missing {
            return Err(StorageError::Unavailable(format!(
                "no store at {}",
                root.display()
            )));
        }

        fs::create_dir_all(root.join(COLLECTIONS_DIR)).map_err(|e| {
            StorageError::Unavailable(format!("cannot create {}: {e}", root.display()))
        })?;

        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(root.join(LOCK_FILE))
            .map_err(|e| StorageError::Unavailable(format!("cannot open lock file: {e}")))?;
        lock.try_lock_exclusive().map_err(|_| {
            StorageError::Unavailable(format!(
                "store at {} is locked by another process",
                root.display()
            ))
        })?;

        let manifest_path = root.join(MANIFEST_FILE);
        let manifest = if manifest_path.exists() {
            Manifest::decode(&fs::read(&manifest_path)?)?
        } else {
            let manifest = Manifest::new(config.format_version);
            write_atomic(root, &manifest_path, &manifest.encode()?)?;
            manifest
        };

        let mut collections = HashMap::new();
        for (name, stem) in &manifest.collections {
            let path = snapshot_path(root, stem);
            let snapshot = if path.exists() {
                ciborium::from_reader(fs::read(&path)?.as_slice()).map_err(|e| {
                    StorageError::Corrupted(format!("snapshot for {name} is unreadable: {e}"))
                })?
            } else {
                Snapshot::new()
            };
            collections.insert(name.clone(), snapshot);
        }

        info!(
            path = %root.display(),
            collections = collections.len(),
            "opened file store"
        );

        Ok(Self {
            root: root.to_path_buf(),
            state: RwLock::new(State {
                manifest,
                collections,
            }),
            io: tokio::sync::Mutex::new(()),
            lock: Mutex::new(Some(lock)),
            closed: AtomicBool::new(false),
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Returns the format version recorded in the manifest.
    #[must_use]
    pub fn format_version(&self) -> (u16, u16) {
        self.state.read().manifest.format_version
    }

    fn check_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }

    /// Applies a mutation to one collection and persists the result.
    ///
    /// The mutation runs on a copy; memory is updated only once the copy is
    /// on disk. The io mutex is held throughout, so snapshots reach disk in
    /// the order they were taken.
    async fn mutate<F>(&self, collection: &str, create: bool, f: F) -> StorageResult<()>
    where
        F: FnOnce(&mut Snapshot),
    {
        let _io = self.io.lock().await;
        self.check_open()?;

        let (manifest, snapshot, flush) = {
            let state = self.state.read();

            let mut manifest = None;
            let stem = match state.manifest.stem(collection) {
                Some(stem) => stem.to_string(),
                None if create => {
                    let mut staged = state.manifest.clone();
                    let (stem, _) = staged.register(collection);
                    manifest = Some(staged);
                    stem
                }
                None => return Ok(()),
            };

            let mut snapshot = state.collections.get(collection).cloned().unwrap_or_default();
            f(&mut snapshot);

            let mut bytes = Vec::new();
            ciborium::into_writer(&snapshot, &mut bytes).map_err(StorageError::codec)?;

            let flush = Flush {
                manifest: manifest.as_ref().map(Manifest::encode).transpose()?,
                snapshot: Some((stem, bytes)),
            };
            (manifest, snapshot, flush)
        };

        self.flush(flush).await?;

        let mut state = self.state.write();
        if let Some(manifest) = manifest {
            state.manifest = manifest;
        }
        state.collections.insert(collection.to_string(), snapshot);
        Ok(())
    }

    async fn flush(&self, flush: Flush) -> StorageResult<()> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            if let Some((stem, bytes)) = flush.snapshot {
                write_atomic(&root.join(COLLECTIONS_DIR), &snapshot_path(&root, &stem), &bytes)?;
            }
            // Manifest goes last so a registered collection always has a snapshot.
            if let Some(bytes) = flush.manifest {
                write_atomic(&root, &root.join(MANIFEST_FILE), &bytes)?;
            }
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Io(io::Error::other(e)))?
    }
}

#[async_trait]
impl LocalStore for FileStore {
    async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Record>> {
        self.check_open()?;
        Ok(self
            .state
            .read()
            .collections
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned())
    }

    async fn get_all(&self, collection: &str) -> StorageResult<Vec<Record>> {
        self.check_open()?;
        Ok(self
            .state
            .read()
            .collections
            .get(collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn put(&self, collection: &str, record: Record) -> StorageResult<()> {
        self.bulk_put(collection, vec![record]).await
    }

    async fn bulk_put(&self, collection: &str, records: Vec<Record>) -> StorageResult<()> {
        let keyed = keyed(collection, records)?;
        debug!(collection, count = keyed.len(), "bulk put");
        self.mutate(collection, true, |snapshot| snapshot.extend(keyed))
            .await
    }

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<()> {
        self.mutate(collection, false, |snapshot| {
            snapshot.remove(id);
        })
        .await
    }

    async fn clear(&self, collection: &str) -> StorageResult<()> {
        self.mutate(collection, false, Snapshot::clear).await
    }

    async fn collections(&self) -> StorageResult<Vec<String>> {
        self.check_open()?;
        Ok(self.state.read().manifest.collections.keys().cloned().collect())
    }

    async fn ensure_collections(&self, names: &[String]) -> StorageResult<()> {
        for name in names {
            self.mutate(name, true, |_| {}).await?;
        }
        Ok(())
    }

    async fn destroy(&self) -> StorageResult<()> {
        let _io = self.io.lock().await;
        self.closed.store(true, Ordering::SeqCst);
        {
            let mut state = self.state.write();
            state.collections.clear();
            state.manifest.collections.clear();
        }

        // Dropping the handle releases the advisory lock.
        if let Some(lock) = self.lock.lock().take() {
            let _ = FileExt::unlock(&lock);
        }

        let root = self.root.clone();
        tokio::task::spawn_blocking(move || match fs::remove_dir_all(&root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        })
        .await
        .map_err(|e| StorageError::Io(io::Error::other(e)))??;

        info!(path = %self.root.display(), "destroyed file store");
        Ok(())
    }
}

fn snapshot_path(root: &Path, stem: &str) -> PathBuf {
    root.join(COLLECTIONS_DIR).join(format!("{stem}.cbor"))
}

fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> StorageResult<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| StorageError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn file_create_new() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("store");

        let store = FileStore::open(&root, FileStoreConfig::default()).unwrap();
        assert!(root.join(MANIFEST_FILE).exists());
        assert!(store.collections().await.unwrap().is_empty());
        assert_eq!(store.format_version(), (MANIFEST_VERSION, 0));
    }

    #[tokio::test]
    async fn file_missing_without_create_is_unavailable() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("absent");

        let result = FileStore::open(&root, FileStoreConfig::default().create_if_missing(false));
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
    }

    #[tokio::test]
    async fn file_put_and_get() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path(), FileStoreConfig::default()).unwrap();

        store
            .put("Characters", record(json!({ "id": "c1", "name": "Mira", "level": 3 })))
            .await
            .unwrap();

        let found = store.get("Characters", "c1").await.unwrap().unwrap();
        assert_eq!(found["name"], "Mira");
        assert_eq!(store.collections().await.unwrap(), vec!["Characters"]);
    }

    #[tokio::test]
    async fn file_persists_across_reopen() {
        let dir = tempdir().unwrap();

        {
            let store = FileStore::open(dir.path(), FileStoreConfig::default()).unwrap();
            store
                .bulk_put(
                    "Inventory",
                    vec![
                        record(json!({ "id": "rope", "qty": 2 })),
                        record(json!({ "id": "torch", "qty": 5, "lit": false })),
                    ],
                )
                .await
                .unwrap();
            store.delete("Inventory", "rope").await.unwrap();
        }

        let store = FileStore::open(dir.path(), FileStoreConfig::default()).unwrap();
        let all = store.get_all("Inventory").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["id"], "torch");
        assert_eq!(all[0]["qty"], 5);
        assert_eq!(all[0]["lit"], false);
    }

    #[tokio::test]
    async fn failed_write_leaves_memory_untouched() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path(), FileStoreConfig::default()).unwrap();
        store
            .put("Quests", record(json!({ "id": "q1", "done": false })))
            .await
            .unwrap();

        // A plain file where the snapshot directory should be makes every
        // snapshot write fail.
        fs::remove_dir_all(dir.path().join(COLLECTIONS_DIR)).unwrap();
        fs::write(dir.path().join(COLLECTIONS_DIR), b"not a directory").unwrap();

        let result = store
            .bulk_put(
                "Quests",
                vec![
                    record(json!({ "id": "q1", "done": true })),
                    record(json!({ "id": "q2", "done": false })),
                ],
            )
            .await;
        assert!(matches!(result, Err(StorageError::Io(_))));

        let all = store.get_all("Quests").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["done"], false);

        let result = store.put("Rumors", record(json!({ "id": "r1" }))).await;
        assert!(result.is_err());
        assert_eq!(store.collections().await.unwrap(), vec!["Quests"]);
    }

    #[tokio::test]
    async fn file_second_open_is_locked() {
        let dir = tempdir().unwrap();
        let _first = FileStore::open(dir.path(), FileStoreConfig::default()).unwrap();

        let second = FileStore::open(dir.path(), FileStoreConfig::default());
        assert!(matches!(second, Err(StorageError::Unavailable(_))));
    }

    #[tokio::test]
    async fn file_clear_keeps_collection() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path(), FileStoreConfig::default()).unwrap();

        store
            .put("Notes", record(json!({ "id": "n1", "text": "ambush at the ford" })))
            .await
            .unwrap();
        store.clear("Notes").await.unwrap();

        assert!(store.get_all("Notes").await.unwrap().is_empty());
        assert_eq!(store.collections().await.unwrap(), vec!["Notes"]);
    }

    #[tokio::test]
    async fn file_ensure_collections_registers_names() {
        let dir = tempdir().unwrap();
        {
            let store = FileStore::open(dir.path(), FileStoreConfig::default()).unwrap();
            store
                .ensure_collections(&["Skills".to_string(), "Metadata".to_string()])
                .await
                .unwrap();
        }

        let store = FileStore::open(dir.path(), FileStoreConfig::default()).unwrap();
        assert_eq!(store.collections().await.unwrap(), vec!["Metadata", "Skills"]);
    }

    #[tokio::test]
    async fn file_destroy_removes_directory() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("store");
        let store = FileStore::open(&root, FileStoreConfig::default()).unwrap();
        store
            .put("Notes", record(json!({ "id": "n1" })))
            .await
            .unwrap();

        store.destroy().await.unwrap();
        assert!(!root.exists());
        assert!(matches!(
            store.get("Notes", "n1").await,
            Err(StorageError::Closed)
        ));

        // The lock is released, so a fresh store can take its place.
        let reopened = FileStore::open(&root, FileStoreConfig::default()).unwrap();
        assert!(reopened.get_all("Notes").await.unwrap().is_empty());
    }
}
