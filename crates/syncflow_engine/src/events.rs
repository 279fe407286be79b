//! Lifecycle and entity-type event distribution.
//!
//! Two registries live side by side:
//!
//! - lifecycle listeners, keyed by [`SyncEventKind`]
//! - entity listeners, keyed by entity-type name
//!
//! Callbacks run synchronously on the emitting task, in registration order.
//! A panicking callback is logged and does not prevent the others from
//! running.

use crate::error::{EngineError, EngineResult};
use crate::state::EngineStatus;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use syncflow_store::{Entity, Operation};
use tracing::error;

/// Handle returned by listener registration, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Kind of lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncEventKind {
    /// A cycle started.
    SyncStart,
    /// A cycle finished.
    SyncComplete,
    /// A cycle aborted.
    SyncError,
    /// The engine status changed.
    StatusChange,
    /// An operation was applied.
    OperationComplete,
}

impl SyncEventKind {
    /// Returns the camelCase event name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncEventKind::SyncStart => "syncStart",
            SyncEventKind::SyncComplete => "syncComplete",
            SyncEventKind::SyncError => "syncError",
            SyncEventKind::StatusChange => "statusChange",
            SyncEventKind::OperationComplete => "operationComplete",
        }
    }
}

/// A lifecycle event.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A cycle started.
    SyncStart,
    /// A cycle finished.
    SyncComplete,
    /// A cycle aborted with the given failure.
    SyncError(Arc<EngineError>),
    /// The engine status changed.
    StatusChange(EngineStatus),
    /// An operation was applied. Carries the operation as persisted.
    OperationComplete(Operation),
}

impl SyncEvent {
    /// Returns the kind of this event.
    pub fn kind(&self) -> SyncEventKind {
        match self {
            SyncEvent::SyncStart => SyncEventKind::SyncStart,
            SyncEvent::SyncComplete => SyncEventKind::SyncComplete,
            SyncEvent::SyncError(_) => SyncEventKind::SyncError,
            SyncEvent::StatusChange(_) => SyncEventKind::StatusChange,
            SyncEvent::OperationComplete(_) => SyncEventKind::OperationComplete,
        }
    }
}

/// Lifecycle event callback.
pub type EventCallback = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Entity snapshot callback.
pub type EntityCallback = Arc<dyn Fn(&[Entity]) + Send + Sync>;

type Registry<K, C> = RwLock<HashMap<K, Vec<(ListenerId, C)>>>;

/// Publish/subscribe hub for an engine.
pub struct EventBus {
    next_id: AtomicU64,
    listeners: Registry<SyncEventKind, EventCallback>,
    entity_listeners: Registry<String, EntityCallback>,
}

impl EventBus {
    /// Creates a bus with an empty listener set for each entity type.
    pub fn new<'a>(entity_types: impl IntoIterator<Item = &'a str>) -> Self {
        let entity_listeners = entity_types
            .into_iter()
            .map(|entity_type| (entity_type.to_string(), Vec::new()))
            .collect();
        Self {
            next_id: AtomicU64::new(1),
            listeners: RwLock::new(HashMap::new()),
            entity_listeners: RwLock::new(entity_listeners),
        }
    }

    fn next_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a lifecycle listener.
    pub fn add_listener(&self, kind: SyncEventKind, callback: EventCallback) -> ListenerId {
        let id = self.next_id();
        self.listeners
            .write()
            .entry(kind)
            .or_default()
            .push((id, callback));
        id
    }

    /// Removes a lifecycle listener. Unknown ids are ignored.
    pub fn remove_listener(&self, kind: SyncEventKind, id: ListenerId) {
        if let Some(callbacks) = self.listeners.write().get_mut(&kind) {
            callbacks.retain(|(listener, _)| *listener != id);
        }
    }

    /// Registers a listener for snapshots of one entity type.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownEntityType`] if the entity type is not
    /// in the registry.
    pub fn add_entity_listener(
        &self,
        entity_type: &str,
        callback: EntityCallback,
    ) -> EngineResult<ListenerId> {
        let mut registry = self.entity_listeners.write();
        let callbacks = registry
            .get_mut(entity_type)
            .ok_or_else(|| EngineError::UnknownEntityType(entity_type.to_string()))?;
        let id = self.next_id();
        callbacks.push((id, callback));
        Ok(id)
    }

    /// Removes an entity listener. Unknown types and ids are ignored.
    pub fn remove_entity_listener(&self, entity_type: &str, id: ListenerId) {
        if let Some(callbacks) = self.entity_listeners.write().get_mut(entity_type) {
            callbacks.retain(|(listener, _)| *listener != id);
        }
    }

    /// Returns the number of lifecycle listeners for an event kind.
    pub fn listener_count(&self, kind: SyncEventKind) -> usize {
        self.listeners.read().get(&kind).map_or(0, Vec::len)
    }

    /// Returns the number of listeners for an entity type.
    pub fn entity_listener_count(&self, entity_type: &str) -> usize {
        self.entity_listeners
            .read()
            .get(entity_type)
            .map_or(0, Vec::len)
    }

    /// Delivers a lifecycle event to its listeners.
    pub fn emit(&self, event: &SyncEvent) {
        let kind = event.kind();
        let callbacks: Vec<EventCallback> = match self.listeners.read().get(&kind) {
            Some(callbacks) => callbacks.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            None => return,
        };

        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                error!(event = kind.as_str(), "event listener panicked");
            }
        }
    }

    /// Delivers a fresh snapshot to the listeners of its entity type.
    pub fn emit_entities(&self, entity_type: &str, entities: &[Entity]) {
        let callbacks: Vec<EntityCallback> = match self.entity_listeners.read().get(entity_type) {
            Some(callbacks) => callbacks.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            None => return,
        };

        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(entities))).is_err() {
                error!(entity = entity_type, "entity listener panicked");
            }
        }
    }
}
