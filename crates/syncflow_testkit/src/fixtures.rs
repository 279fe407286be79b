//! Test fixtures and store helpers.
//!
//! Provides payload builders for a "todo" entity type and stores seeded
//! with common scenarios.

use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use syncflow_store::{
    Entity, FileStore, MemoryStore, NewOperation, Operation, OperationStatus, OperationType,
    SyncStore,
};
use tempfile::TempDir;

/// Entity type used by the fixtures.
pub const TODO: &str = "todo";

/// Builds a todo payload.
pub fn todo(id: &str, title: &str) -> Value {
    json!({"id": id, "title": title, "completed": false})
}

/// Builds a todo entity.
pub fn todo_entity(id: &str, title: &str) -> Entity {
    match todo(id, title) {
        Value::Object(map) => map,
        _ => unreachable!("todo payloads are objects"),
    }
}

/// Converts a JSON object literal into an entity.
///
/// # Panics
///
/// Panics if `value` is not an object.
pub fn entity(value: Value) -> Entity {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// A pending `create` for the todo entity type.
pub fn create_todo(id: &str, title: &str) -> NewOperation {
    NewOperation::pending(OperationType::Create, TODO, todo(id, title))
}

/// A pending `update` for the todo entity type.
pub fn update_todo(id: &str, fields: Value) -> NewOperation {
    let mut data = fields;
    if let Value::Object(map) = &mut data {
        map.insert("id".into(), Value::String(id.into()));
    }
    NewOperation::pending(OperationType::Update, TODO, data)
}

/// A pending `delete` for the todo entity type.
pub fn delete_todo(id: &str) -> NewOperation {
    NewOperation::pending(OperationType::Delete, TODO, json!({"id": id}))
}

/// Creates a memory store holding the given operations, in order.
pub async fn seeded_store(operations: Vec<NewOperation>) -> (MemoryStore, Vec<Operation>) {
    let store = MemoryStore::new();
    let added = seed(&store, operations).await;
    (store, added)
}

/// Adds operations to a store and returns them as stored.
///
/// # Panics
///
/// Panics if the store rejects an operation.
pub async fn seed<S: SyncStore + ?Sized>(
    store: &S,
    operations: Vec<NewOperation>,
) -> Vec<Operation> {
    let mut added = Vec::with_capacity(operations.len());
    for operation in operations {
        added.push(
            store
                .add_operation(operation)
                .await
                .expect("Failed to seed operation"),
        );
    }
    added
}

/// Creates a memory store with one operation in each status.
///
/// Returns the store and the `[pending, completed, error]` operations.
pub async fn mixed_status_store() -> (MemoryStore, Vec<Operation>) {
    seeded_store(vec![
        create_todo("p", "pending"),
        create_todo("c", "completed").with_status(OperationStatus::Completed),
        create_todo("e", "error")
            .with_status(OperationStatus::Error)
            .with_retry_count(3),
    ])
    .await
}

/// A file store in a temporary directory that is removed on drop.
pub struct TestFileStore {
    /// The store instance.
    pub store: Arc<FileStore>,
    _temp_dir: TempDir,
}

impl TestFileStore {
    /// Opens a file store in a fresh temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the directory or store cannot be created.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::open(temp_dir.path()).expect("Failed to open file store");
        Self {
            store: Arc::new(store),
            _temp_dir: temp_dir,
        }
    }

    /// Returns a shared handle to the store, e.g. for an engine.
    pub fn shared(&self) -> Arc<FileStore> {
        Arc::clone(&self.store)
    }

    /// Returns the store directory.
    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// Closes the store and opens it again from disk.
    ///
    /// # Panics
    ///
    /// Panics if the store cannot be reopened, including when a handle from
    /// [`shared`](Self::shared) is still alive and holds the directory lock.
    pub fn reopen(self) -> Self {
        let Self {
            store,
            _temp_dir: temp_dir,
        } = self;
        drop(store);
        let store = FileStore::open(temp_dir.path()).expect("Failed to reopen file store");
        Self {
            store: Arc::new(store),
            _temp_dir: temp_dir,
        }
    }
}

impl Default for TestFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestFileStore {
    type Target = FileStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}
