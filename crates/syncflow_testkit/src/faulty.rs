//! Fault-injecting store wrapper.
//!
//! Wraps any store and fails selected calls with
//! [`StoreError::Unavailable`]. Faults can be toggled while an engine is
//! running over the store.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use syncflow_store::{
    BoxFuture, Entity, NewOperation, Operation, OperationPatch, OperationStatus, StoreError,
    SyncStore,
};

/// A store call that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// `get_operations` fails.
    ListOperations,
    /// `add_operation` fails.
    AddOperation,
    /// `update_operation` fails for patches that set `completed`.
    CompleteOperation,
    /// Every `update_operation` fails.
    AllUpdates,
    /// `remove_operation` fails.
    RemoveOperation,
    /// `get_entities` fails.
    GetEntities,
    /// `save_entities` fails.
    SaveEntities,
    /// `clean_storage` fails.
    CleanStorage,
}

/// A store wrapper that injects failures.
pub struct FaultyStore<S: SyncStore> {
    inner: S,
    faults: Mutex<HashSet<Fault>>,
    one_shot: Mutex<HashMap<Fault, usize>>,
    injected: AtomicUsize,
}

impl<S: SyncStore> FaultyStore<S> {
    /// Wraps a store with no faults enabled.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Mutex::new(HashSet::new()),
            one_shot: Mutex::new(HashMap::new()),
            injected: AtomicUsize::new(0),
        }
    }

    /// Makes every matching call fail until disabled.
    pub fn enable(&self, fault: Fault) {
        self.faults.lock().insert(fault);
    }

    /// Stops failing matching calls.
    pub fn disable(&self, fault: Fault) {
        self.faults.lock().remove(&fault);
        self.one_shot.lock().remove(&fault);
    }

    /// Makes the next `times` matching calls fail.
    pub fn fail_next(&self, fault: Fault, times: usize) {
        *self.one_shot.lock().entry(fault).or_default() += times;
    }

    /// Returns how many failures have been injected.
    pub fn injected_failures(&self) -> usize {
        self.injected.load(Ordering::SeqCst)
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check(&self, fault: Fault) -> Result<(), StoreError> {
        let fire = self.faults.lock().contains(&fault) || {
            let mut one_shot = self.one_shot.lock();
            match one_shot.get_mut(&fault) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        if fire {
            self.injected.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::unavailable(format!("injected fault: {fault:?}")))
        } else {
            Ok(())
        }
    }
}

impl<S: SyncStore> SyncStore for FaultyStore<S> {
    fn get_operations(&self) -> BoxFuture<'_, Vec<Operation>> {
        Box::pin(async move {
            self.check(Fault::ListOperations)?;
            self.inner.get_operations().await
        })
    }

    fn add_operation(&self, operation: NewOperation) -> BoxFuture<'_, Operation> {
        Box::pin(async move {
            self.check(Fault::AddOperation)?;
            self.inner.add_operation(operation).await
        })
    }

    fn update_operation<'a>(&'a self, id: &'a str, patch: OperationPatch) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.check(Fault::AllUpdates)?;
            if patch.status == Some(OperationStatus::Completed) {
                self.check(Fault::CompleteOperation)?;
            }
            self.inner.update_operation(id, patch).await
        })
    }

    fn remove_operation<'a>(&'a self, id: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.check(Fault::RemoveOperation)?;
            self.inner.remove_operation(id).await
        })
    }

    fn get_entities<'a>(&'a self, entity_type: &'a str) -> BoxFuture<'a, Vec<Entity>> {
        Box::pin(async move {
            self.check(Fault::GetEntities)?;
            self.inner.get_entities(entity_type).await
        })
    }

    fn save_entities<'a>(
        &'a self,
        entity_type: &'a str,
        entities: Vec<Entity>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.check(Fault::SaveEntities)?;
            self.inner.save_entities(entity_type, entities).await
        })
    }

    fn clean_storage(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.check(Fault::CleanStorage)?;
            self.inner.clean_storage().await
        })
    }
}
