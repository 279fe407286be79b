//! Application-facing wrapper around an engine.

use crate::config::SyncConfig;
use crate::engine::SyncEngine;
use crate::error::{EngineError, EngineResult};
use crate::events::{ListenerId, SyncEvent, SyncEventKind};
use crate::state::EngineStatus;
use serde_json::Value;
use std::sync::Arc;
use syncflow_store::{Entity, NewOperation, Operation, OperationType, SyncStore};
use tokio::sync::watch;

/// An engine bundled with observable status and enqueue helpers.
///
/// Building a context validates that entity types were configured, creates
/// the engine and calls [`SyncEngine::init`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use syncflow_engine::{SyncConfig, SyncContext};
/// use syncflow_store::{MemoryStore, OperationType};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let config = SyncConfig::new(["todo"]).with_auto_start(false);
/// let ctx = SyncContext::new(Arc::new(MemoryStore::new()), config).unwrap();
///
/// ctx.add_operation(OperationType::Create, "todo", json!({"id": "t1"}))
///     .await
///     .unwrap();
/// ctx.sync().await;
///
/// assert_eq!(ctx.entities("todo").await.unwrap().len(), 1);
/// # }
/// ```
pub struct SyncContext<S: SyncStore> {
    engine: SyncEngine<S>,
    status: watch::Receiver<EngineStatus>,
    status_listener: ListenerId,
}

impl<S: SyncStore> SyncContext<S> {
    /// Creates the engine and runs its `init`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingEntityTypes`] if the configuration has
    /// no entity types, or any error from engine construction or `init`.
    pub fn new(store: Arc<S>, config: SyncConfig) -> EngineResult<Self> {
        if config.entity_types.is_empty() {
            return Err(EngineError::MissingEntityTypes);
        }

        let engine = SyncEngine::new(store, config)?;
        let (status_tx, status_rx) = watch::channel(engine.status());
        let status_listener = engine.add_listener(SyncEventKind::StatusChange, move |event| {
            if let SyncEvent::StatusChange(status) = event {
                status_tx.send_replace(*status);
            }
        });
        engine.init()?;

        Ok(Self {
            engine,
            status: status_rx,
            status_listener,
        })
    }

    /// Returns the underlying engine.
    pub fn engine(&self) -> &SyncEngine<S> {
        &self.engine
    }

    /// Returns the last observed engine status.
    pub fn status(&self) -> EngineStatus {
        *self.status.borrow()
    }

    /// Returns a receiver that is notified on every status change.
    pub fn subscribe_status(&self) -> watch::Receiver<EngineStatus> {
        self.status.clone()
    }

    /// Returns true while a cycle is running.
    pub fn is_loading(&self) -> bool {
        self.status().is_active()
    }

    /// Enqueues a pending operation with no failed attempts.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub async fn add_operation(
        &self,
        op_type: OperationType,
        entity: impl Into<String>,
        data: Value,
    ) -> EngineResult<Operation> {
        let operation = NewOperation::pending(op_type, entity, data);
        Ok(self.engine.store().add_operation(operation).await?)
    }

    /// Runs one reconciliation cycle.
    pub async fn sync(&self) {
        self.engine.sync().await;
    }

    /// Re-reads the snapshot of an entity type.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn entities(&self, entity_type: &str) -> EngineResult<Vec<Entity>> {
        self.engine.get_entities(entity_type).await
    }

    /// Registers a lifecycle listener for as long as the guard lives.
    pub fn listen<F>(&self, kind: SyncEventKind, callback: F) -> ListenerGuard<S>
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let id = self.engine.add_listener(kind, callback);
        ListenerGuard {
            engine: self.engine.clone(),
            target: Target::Event(kind),
            id,
        }
    }

    /// Registers an entity listener for as long as the guard lives.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownEntityType`] if the entity type is not
    /// in the registry.
    pub fn listen_entities<F>(
        &self,
        entity_type: &str,
        callback: F,
    ) -> EngineResult<ListenerGuard<S>>
    where
        F: Fn(&[Entity]) + Send + Sync + 'static,
    {
        let id = self.engine.add_entity_listener(entity_type, callback)?;
        Ok(ListenerGuard {
            engine: self.engine.clone(),
            target: Target::Entity(entity_type.to_string()),
            id,
        })
    }
}

impl<S: SyncStore> Drop for SyncContext<S> {
    fn drop(&mut self) {
        self.engine
            .remove_listener(SyncEventKind::StatusChange, self.status_listener);
    }
}

enum Target {
    Event(SyncEventKind),
    Entity(String),
}

/// Unsubscribes its listener when dropped.
#[must_use = "the listener is removed when the guard is dropped"]
pub struct ListenerGuard<S: SyncStore> {
    engine: SyncEngine<S>,
    target: Target,
    id: ListenerId,
}

impl<S: SyncStore> ListenerGuard<S> {
    /// Returns the id of the guarded listener.
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl<S: SyncStore> Drop for ListenerGuard<S> {
    fn drop(&mut self) {
        match &self.target {
            Target::Event(kind) => self.engine.remove_listener(*kind, self.id),
            Target::Entity(entity_type) => self.engine.remove_entity_listener(entity_type, self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::time::Duration;
    use syncflow_store::{MemoryStore, OperationStatus};

    fn context() -> SyncContext<MemoryStore> {
        SyncContext::new(
            Arc::new(MemoryStore::new()),
            SyncConfig::new(["todo"]).with_auto_start(false),
        )
        .unwrap()
    }

    #[test]
    fn requires_entity_types() {
        let result = SyncContext::new(Arc::new(MemoryStore::new()), SyncConfig::default());
        assert!(matches!(result, Err(EngineError::MissingEntityTypes)));
    }

    #[tokio::test]
    async fn init_starts_engine_when_auto_start() {
        let ctx = SyncContext::new(
            Arc::new(MemoryStore::new()),
            SyncConfig::new(["todo"]).with_sync_interval(Duration::from_secs(60)),
        )
        .unwrap();
        assert!(ctx.engine().is_running());
        assert_eq!(ctx.status(), EngineStatus::Idle);
        ctx.engine().stop();
        assert_eq!(ctx.status(), EngineStatus::Offline);
    }

    #[tokio::test]
    async fn add_operation_enqueues_pending() {
        let ctx = context();
        let op = ctx
            .add_operation(OperationType::Create, "todo", json!({"id": "t1"}))
            .await
            .unwrap();

        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.retry_count, 0);
        assert_eq!(op.entity, "todo");
        assert_eq!(
            ctx.engine().get_pending_operations().await.unwrap(),
            vec![op]
        );
    }

    #[tokio::test]
    async fn is_loading_while_syncing() {
        let ctx = context();
        let during = Arc::new(Mutex::new(None));

        let mut status = ctx.subscribe_status();
        let observed = ctx.subscribe_status();
        let sink = Arc::clone(&during);
        let _guard = ctx.listen(SyncEventKind::SyncStart, move |_| {
            *sink.lock() = Some(observed.borrow().is_active());
        });
        ctx.sync().await;

        assert_eq!(*during.lock(), Some(true));
        assert!(status.has_changed().unwrap());
        assert_eq!(*status.borrow_and_update(), EngineStatus::Idle);
        assert!(!ctx.is_loading());
    }

    #[tokio::test]
    async fn guards_unsubscribe_on_drop() {
        let ctx = context();

        let guard = ctx.listen(SyncEventKind::SyncComplete, |_| {});
        assert_eq!(ctx.engine().listener_count(SyncEventKind::SyncComplete), 1);
        drop(guard);
        assert_eq!(ctx.engine().listener_count(SyncEventKind::SyncComplete), 0);

        let entities = ctx.listen_entities("todo", |_| {}).unwrap();
        assert_eq!(ctx.engine().entity_listener_count("todo"), 1);
        drop(entities);
        assert_eq!(ctx.engine().entity_listener_count("todo"), 0);

        assert!(matches!(
            ctx.listen_entities("note", |_| {}),
            Err(EngineError::UnknownEntityType(_))
        ));
    }
}
