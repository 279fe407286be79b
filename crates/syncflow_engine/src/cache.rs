//! Read-through entity cache.

use crate::error::EngineResult;
use parking_lot::RwLock;
use std::collections::HashMap;
use syncflow_store::{Entity, SyncStore};

/// In-memory mirror of the store's entity snapshots.
///
/// Reads always go to the store first and overwrite the cached copy, so the
/// cache never serves data older than the last read or write through it.
#[derive(Debug, Default)]
pub struct EntityCache {
    entries: RwLock<HashMap<String, Vec<Entity>>>,
}

impl EntityCache {
    /// Creates a cache with an empty entry for each entity type.
    pub fn new<'a>(entity_types: impl IntoIterator<Item = &'a str>) -> Self {
        let entries = entity_types
            .into_iter()
            .map(|entity_type| (entity_type.to_string(), Vec::new()))
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Re-reads a snapshot from the store and caches it.
    pub async fn refresh<S: SyncStore + ?Sized>(
        &self,
        store: &S,
        entity_type: &str,
    ) -> EngineResult<Vec<Entity>> {
        let entities = store.get_entities(entity_type).await?;
        self.put(entity_type, entities.clone());
        Ok(entities)
    }

    /// Replaces the cached snapshot for an entity type.
    pub fn put(&self, entity_type: &str, entities: Vec<Entity>) {
        self.entries
            .write()
            .insert(entity_type.to_string(), entities);
    }

    /// Returns the cached snapshot without touching the store.
    pub fn cached(&self, entity_type: &str) -> Option<Vec<Entity>> {
        self.entries.read().get(entity_type).cloned()
    }

    /// Drops every cached snapshot.
    pub fn clear(&self) {
        for entities in self.entries.write().values_mut() {
            entities.clear();
        }
    }
}
