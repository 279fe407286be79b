//! File-based store for persistent queues.
//!
//! Directory layout:
//!
//! ```text
//! <dir>/
//! ├─ LOCK              # Advisory lock for single-process access
//! ├─ operations.json   # Operation log (absent when empty)
//! └─ entities.json     # Entity snapshots by type (absent when empty)
//! ```

use crate::error::{StoreError, StoreResult};
use crate::operation::{now_millis, Entity, NewOperation, Operation, OperationPatch};
use crate::store::{BoxFuture, SyncStore};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

const LOCK_FILE: &str = "LOCK";
const OPERATIONS_FILE: &str = "operations.json";
const ENTITIES_FILE: &str = "entities.json";
const TEMP_EXTENSION: &str = "json.tmp";

#[derive(Debug, Default)]
struct FileState {
    operations: Vec<Operation>,
    entities: BTreeMap<String, Vec<Entity>>,
}

/// A file-based store.
///
/// Operations and entity snapshots are loaded into memory on open and
/// written back after every mutation. Each write goes to a temporary file
/// that is synced and then renamed over the target, and the directory is
/// synced after the rename, so a crash leaves either the old or the new
/// contents. A file is removed once its collection becomes empty.
///
/// The in-memory state only changes after the matching write succeeds.
///
/// # Thread Safety
///
/// Writes are serialized through an internal async mutex. The store holds an
/// exclusive lock on the directory for its whole lifetime; a second
/// `open` on the same directory fails with [`StoreError::Locked`].
///
/// # Example
///
/// ```no_run
/// use syncflow_store::{FileStore, SyncStore};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = FileStore::open(Path::new("queue")).unwrap();
/// let pending = store.get_operations().await.unwrap();
/// # }
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: Mutex<FileState>,
    _lock_file: File,
}

impl FileStore {
    /// Opens or creates a store in the given directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - Another process holds the directory lock
    /// - A persisted file is not valid JSON
    pub fn open(path: &Path) -> StoreResult<Self> {
        fs::create_dir_all(path)?;
        if !path.is_dir() {
            return Err(StoreError::Corrupted(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked(path.to_path_buf()));
        }

        let state = FileState {
            operations: load_json(&path.join(OPERATIONS_FILE))?,
            entities: load_json(&path.join(ENTITIES_FILE))?,
        };
        debug!(
            path = %path.display(),
            operations = state.operations.len(),
            entity_types = state.entities.len(),
            "opened file store"
        );

        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(state),
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist_operations(&self, operations: &[Operation]) -> StoreResult<()> {
        let bytes = if operations.is_empty() {
            None
        } else {
            Some(serde_json::to_vec_pretty(operations)?)
        };
        write_or_remove(&self.path, OPERATIONS_FILE, bytes).await
    }

    async fn persist_entities(&self, entities: &BTreeMap<String, Vec<Entity>>) -> StoreResult<()> {
        let bytes = if entities.is_empty() {
            None
        } else {
            Some(serde_json::to_vec_pretty(entities)?)
        };
        write_or_remove(&self.path, ENTITIES_FILE, bytes).await
    }
}

fn load_json<T: DeserializeOwned + Default>(path: &Path) -> StoreResult<T> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes)
        .map_err(|e| StoreError::Corrupted(format!("{}: {}", path.display(), e)))
}

/// Replaces `dir/name` with `bytes`, or removes it when `bytes` is `None`.
///
/// The new contents are written to a temporary file and synced before the
/// rename. The directory is synced afterwards so the rename or removal
/// itself is durable.
async fn write_or_remove(dir: &Path, name: &str, bytes: Option<Vec<u8>>) -> StoreResult<()> {
    let path = dir.join(name);
    match bytes {
        Some(bytes) => {
            let tmp = path.with_extension(TEMP_EXTENSION);
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
            drop(file);

            tokio::fs::rename(&tmp, &path).await?;
        }
        None => match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        },
    }
    sync_directory(dir).await
}

#[cfg(unix)]
async fn sync_directory(dir: &Path) -> StoreResult<()> {
    let dir = tokio::fs::File::open(dir).await?;
    dir.sync_all().await?;
    Ok(())
}

// NTFS journals metadata updates; directories cannot be opened for fsync.
#[cfg(not(unix))]
async fn sync_directory(_dir: &Path) -> StoreResult<()> {
    Ok(())
}

impl SyncStore for FileStore {
    fn get_operations(&self) -> BoxFuture<'_, Vec<Operation>> {
        Box::pin(async move { Ok(self.state.lock().await.operations.clone()) })
    }

    fn add_operation(&self, operation: NewOperation) -> BoxFuture<'_, Operation> {
        Box::pin(async move {
            let operation = operation.into_operation(Uuid::new_v4().to_string(), now_millis());
            let mut state = self.state.lock().await;
            let mut operations = state.operations.clone();
            operations.push(operation.clone());
            self.persist_operations(&operations).await?;
            state.operations = operations;
            Ok(operation)
        })
    }

    fn update_operation<'a>(&'a self, id: &'a str, patch: OperationPatch) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let Some(index) = state.operations.iter().position(|op| op.id == id) else {
                return Ok(());
            };
            let mut operations = state.operations.clone();
            patch.apply_to(&mut operations[index]);
            self.persist_operations(&operations).await?;
            state.operations = operations;
            Ok(())
        })
    }

    fn remove_operation<'a>(&'a self, id: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if !state.operations.iter().any(|op| op.id == id) {
                return Ok(());
            }
            let mut operations = state.operations.clone();
            operations.retain(|op| op.id != id);
            self.persist_operations(&operations).await?;
            state.operations = operations;
            Ok(())
        })
    }

    fn get_entities<'a>(&'a self, entity_type: &'a str) -> BoxFuture<'a, Vec<Entity>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state.entities.get(entity_type).cloned().unwrap_or_default())
        })
    }

    fn save_entities<'a>(
        &'a self,
        entity_type: &'a str,
        entities: Vec<Entity>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let mut snapshots = state.entities.clone();
            if entities.is_empty() {
                snapshots.remove(entity_type);
            } else {
                snapshots.insert(entity_type.to_string(), entities);
            }
            self.persist_entities(&snapshots).await?;
            state.entities = snapshots;
            Ok(())
        })
    }

    fn clean_storage(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            self.persist_operations(&[]).await?;
            state.operations.clear();
            self.persist_entities(&BTreeMap::new()).await?;
            state.entities.clear();
            Ok(())
        })
    }
}
