//! Store instrumented to detect overlapping operation fetches.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use syncflow_store::{
    BoxFuture, Entity, MemoryStore, NewOperation, Operation, OperationPatch, SyncStore,
};

/// A memory store whose `get_operations` holds for a fixed delay and
/// records how many calls were in flight at once.
///
/// Running two cycles concurrently over this store shows up as
/// `max_concurrent_fetches() > 1`.
pub struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
    fetches: AtomicUsize,
}

impl SlowStore {
    /// Creates an empty store whose fetches take `delay`.
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStore::new(),
            delay,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Returns the highest number of simultaneous `get_operations` calls.
    pub fn max_concurrent_fetches(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Returns the total number of `get_operations` calls.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

struct ActiveFetch<'a>(&'a AtomicUsize);

impl Drop for ActiveFetch<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SyncStore for SlowStore {
    fn get_operations(&self) -> BoxFuture<'_, Vec<Operation>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            let _active = ActiveFetch(&self.active);
            self.max_active.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;
            self.inner.get_operations().await
        })
    }

    fn add_operation(&self, operation: NewOperation) -> BoxFuture<'_, Operation> {
        self.inner.add_operation(operation)
    }

    fn update_operation<'a>(&'a self, id: &'a str, patch: OperationPatch) -> BoxFuture<'a, ()> {
        self.inner.update_operation(id, patch)
    }

    fn remove_operation<'a>(&'a self, id: &'a str) -> BoxFuture<'a, ()> {
        self.inner.remove_operation(id)
    }

    fn get_entities<'a>(&'a self, entity_type: &'a str) -> BoxFuture<'a, Vec<Entity>> {
        self.inner.get_entities(entity_type)
    }

    fn save_entities<'a>(
        &'a self,
        entity_type: &'a str,
        entities: Vec<Entity>,
    ) -> BoxFuture<'a, ()> {
        self.inner.save_entities(entity_type, entities)
    }

    fn clean_storage(&self) -> BoxFuture<'_, ()> {
        self.inner.clean_storage()
    }
}
