//! Store contract definition.

use crate::error::StoreResult;
use crate::operation::{Entity, NewOperation, Operation, OperationPatch};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`SyncStore`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// Durable persistence for queued operations and entity snapshots.
///
/// The reconciliation engine is the only writer of operation status and
/// retry counts; callers enqueue through [`add_operation`](Self::add_operation).
///
/// # Invariants
///
/// - `get_operations` returns operations in insertion order
/// - `add_operation` assigns a unique `id` and the current timestamp
/// - `update_operation` and `remove_operation` ignore unknown ids
/// - `save_entities` replaces the snapshot wholesale; an empty list clears it
/// - No method retries internally
///
/// # Implementors
///
/// - [`super::MemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent queues
pub trait SyncStore: Send + Sync + 'static {
    /// Returns a snapshot of every stored operation.
    ///
    /// The returned list is a copy; later writes are not reflected in it.
    fn get_operations(&self) -> BoxFuture<'_, Vec<Operation>>;

    /// Appends a new operation and returns it with its assigned id.
    fn add_operation(&self, operation: NewOperation) -> BoxFuture<'_, Operation>;

    /// Merges `patch` into the operation with the given id.
    ///
    /// Does nothing if no such operation exists.
    fn update_operation<'a>(&'a self, id: &'a str, patch: OperationPatch) -> BoxFuture<'a, ()>;

    /// Removes the operation with the given id, if present.
    fn remove_operation<'a>(&'a self, id: &'a str) -> BoxFuture<'a, ()>;

    /// Returns the snapshot for an entity type, or an empty list.
    fn get_entities<'a>(&'a self, entity_type: &'a str) -> BoxFuture<'a, Vec<Entity>>;

    /// Replaces the snapshot for an entity type.
    fn save_entities<'a>(
        &'a self,
        entity_type: &'a str,
        entities: Vec<Entity>,
    ) -> BoxFuture<'a, ()>;

    /// Clears all operations and all entity snapshots.
    fn clean_storage(&self) -> BoxFuture<'_, ()>;
}
