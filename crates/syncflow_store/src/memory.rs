//! In-memory store for testing.

use crate::operation::{now_millis, Entity, NewOperation, Operation, OperationPatch};
use crate::store::{BoxFuture, SyncStore};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Default)]
struct MemoryState {
    operations: Vec<Operation>,
    entities: HashMap<String, Vec<Entity>>,
}

/// An in-memory store.
///
/// This store keeps everything in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Queues that don't need to survive a restart
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across tasks.
///
/// # Example
///
/// ```rust
/// use syncflow_store::{MemoryStore, SyncStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = MemoryStore::new();
/// assert!(store.get_operations().await.unwrap().is_empty());
/// assert!(store.get_entities("todo").await.unwrap().is_empty());
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with pre-existing operations.
    ///
    /// The operations keep their ids and timestamps. Useful for
    /// testing recovery scenarios.
    #[must_use]
    pub fn with_operations(operations: Vec<Operation>) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                operations,
                entities: HashMap::new(),
            }),
        }
    }

    /// Returns the number of stored operations.
    pub fn operation_count(&self) -> usize {
        self.state.read().operations.len()
    }

    fn insert(&self, operation: NewOperation) -> Operation {
        let operation = operation.into_operation(Uuid::new_v4().to_string(), now_millis());
        self.state.write().operations.push(operation.clone());
        operation
    }

    fn patch(&self, id: &str, patch: OperationPatch) {
        let mut state = self.state.write();
        if let Some(operation) = state.operations.iter_mut().find(|op| op.id == id) {
            patch.apply_to(operation);
        }
    }

    fn replace_entities(&self, entity_type: &str, entities: Vec<Entity>) {
        let mut state = self.state.write();
        if entities.is_empty() {
            state.entities.remove(entity_type);
        } else {
            state.entities.insert(entity_type.to_string(), entities);
        }
    }
}

impl SyncStore for MemoryStore {
    fn get_operations(&self) -> BoxFuture<'_, Vec<Operation>> {
        Box::pin(async move { Ok(self.state.read().operations.clone()) })
    }

    fn add_operation(&self, operation: NewOperation) -> BoxFuture<'_, Operation> {
        Box::pin(async move { Ok(self.insert(operation)) })
    }

    fn update_operation<'a>(&'a self, id: &'a str, patch: OperationPatch) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.patch(id, patch);
            Ok(())
        })
    }

    fn remove_operation<'a>(&'a self, id: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.state.write().operations.retain(|op| op.id != id);
            Ok(())
        })
    }

    fn get_entities<'a>(&'a self, entity_type: &'a str) -> BoxFuture<'a, Vec<Entity>> {
        Box::pin(async move {
            let entities = self
                .state
                .read()
                .entities
                .get(entity_type)
                .cloned()
                .unwrap_or_default();
            Ok(entities)
        })
    }

    fn save_entities<'a>(
        &'a self,
        entity_type: &'a str,
        entities: Vec<Entity>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.replace_entities(entity_type, entities);
            Ok(())
        })
    }

    fn clean_storage(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.write();
            state.operations.clear();
            state.entities.clear();
            Ok(())
        })
    }
}
