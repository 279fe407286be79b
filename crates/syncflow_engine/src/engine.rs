//! The reconciliation engine.

use crate::cache::EntityCache;
use crate::config::SyncConfig;
use crate::error::{EngineError, EngineResult};
use crate::events::{EventBus, ListenerId, SyncEvent, SyncEventKind};
use crate::snapshot::apply_to_snapshot;
use crate::state::{EngineStatus, SyncStats};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};
use syncflow_store::{Entity, Operation, OperationPatch, OperationStatus, SyncStore};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, warn};

/// Drains queued operations into entity snapshots.
///
/// Each cycle lists the store's operations, takes the first `batch_size`
/// pending ones in queue order and applies them one at a time. A failed
/// apply increments the operation's retry count; once the count reaches
/// `retry_limit` the operation is marked `error` and never selected again.
///
/// At most one cycle runs at a time. The timer installed by
/// [`start`](Self::start) and direct [`sync`](Self::sync) calls share the
/// same guard; a call that finds a cycle running returns immediately.
///
/// The engine is cheap to clone. Clones share the same state.
pub struct SyncEngine<S: SyncStore> {
    inner: Arc<Inner<S>>,
}

impl<S: SyncStore> Clone for SyncEngine<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S: SyncStore> {
    store: Arc<S>,
    config: SyncConfig,
    status: RwLock<EngineStatus>,
    stats: RwLock<SyncStats>,
    offline: AtomicBool,
    cycle: tokio::sync::Mutex<()>,
    cache: EntityCache,
    events: EventBus,
    timer: Mutex<Option<watch::Sender<bool>>>,
}

impl<S: SyncStore> SyncEngine<S> {
    /// Creates an engine over `store`.
    ///
    /// Duplicate entity types are dropped, keeping the first occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the configuration is invalid.
    pub fn new(store: Arc<S>, mut config: SyncConfig) -> EngineResult<Self> {
        config.validate()?;

        let mut entity_types: Vec<String> = Vec::with_capacity(config.entity_types.len());
        for entity_type in config.entity_types.drain(..) {
            if !entity_types.contains(&entity_type) {
                entity_types.push(entity_type);
            }
        }
        config.entity_types = entity_types;

        let types = || config.entity_types.iter().map(String::as_str);
        let cache = EntityCache::new(types());
        let events = EventBus::new(types());

        Ok(Self {
            inner: Arc::new(Inner {
                store,
                cache,
                events,
                config,
                status: RwLock::new(EngineStatus::Idle),
                stats: RwLock::new(SyncStats::default()),
                offline: AtomicBool::new(false),
                cycle: tokio::sync::Mutex::new(()),
                timer: Mutex::new(None),
            }),
        })
    }

    /// Starts the engine if the configuration asks for it.
    ///
    /// # Errors
    ///
    /// See [`start`](Self::start).
    pub fn init(&self) -> EngineResult<()> {
        if self.inner.config.auto_start {
            self.start()?;
        }
        Ok(())
    }

    /// Installs the periodic timer and goes `idle`.
    ///
    /// Does nothing if the timer is already installed. The first cycle runs
    /// one `sync_interval` after this call.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoRuntime`] when called outside a Tokio runtime.
    pub fn start(&self) -> EngineResult<()> {
        {
            let mut timer = self.inner.timer.lock();
            if timer.is_some() {
                return Ok(());
            }
            let runtime =
                tokio::runtime::Handle::try_current().map_err(|_| EngineError::NoRuntime)?;

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            runtime.spawn(run_timer(
                Arc::downgrade(&self.inner),
                self.inner.config.sync_interval,
                shutdown_rx,
            ));
            *timer = Some(shutdown_tx);
        }

        self.inner.offline.store(false, Ordering::SeqCst);
        self.inner.set_status(EngineStatus::Idle);
        debug!(
            interval_ms = self.inner.config.sync_interval.as_millis() as u64,
            "sync engine started"
        );
        Ok(())
    }

    /// Removes the timer and goes `offline`.
    ///
    /// A cycle that is already running finishes; operations it applies after
    /// this call stay `pending`.
    pub fn stop(&self) {
        if let Some(shutdown) = self.inner.timer.lock().take() {
            let _ = shutdown.send(true);
        }
        self.inner.offline.store(true, Ordering::SeqCst);
        self.inner.set_status(EngineStatus::Offline);
        debug!("sync engine stopped");
    }

    /// Runs one reconciliation cycle.
    ///
    /// Returns immediately if a cycle is already running. Failures are
    /// reported through events, statistics and the operations' own state.
    pub async fn sync(&self) {
        self.inner.sync().await;
    }

    /// Returns the current status.
    pub fn status(&self) -> EngineStatus {
        *self.inner.status.read()
    }

    /// Returns a copy of the cycle statistics.
    pub fn stats(&self) -> SyncStats {
        self.inner.stats.read().clone()
    }

    /// Returns true while the periodic timer is installed.
    pub fn is_running(&self) -> bool {
        self.inner.timer.lock().is_some()
    }

    /// Returns true after [`stop`](Self::stop) and until the next
    /// [`start`](Self::start).
    pub fn is_offline(&self) -> bool {
        self.inner.offline.load(Ordering::SeqCst)
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Returns the backing store.
    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    /// Re-reads the snapshot of an entity type from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn get_entities(&self, entity_type: &str) -> EngineResult<Vec<Entity>> {
        self.inner
            .cache
            .refresh(&*self.inner.store, entity_type)
            .await
    }

    /// Returns the entity-type registry in configuration order.
    pub fn entity_types(&self) -> &[String] {
        &self.inner.config.entity_types
    }

    /// Returns every pending operation in queue order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn get_pending_operations(&self) -> EngineResult<Vec<Operation>> {
        let operations = self.inner.store.get_operations().await?;
        Ok(operations
            .into_iter()
            .filter(Operation::is_pending)
            .collect())
    }

    /// Deletes every pending operation and returns what was removed.
    ///
    /// Completed and errored operations are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if a store call fails. Operations removed before the
    /// failure stay removed.
    pub async fn remove_pending_operations(&self) -> EngineResult<Vec<Operation>> {
        let pending = self.get_pending_operations().await?;
        for operation in &pending {
            self.inner.store.remove_operation(&operation.id).await?;
        }
        debug!(removed = pending.len(), "removed pending operations");
        Ok(pending)
    }

    /// Deletes every completed operation and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if a store call fails.
    pub async fn cleanup_completed_operations(&self) -> EngineResult<usize> {
        let operations = self.inner.store.get_operations().await?;
        let mut removed = 0;
        for operation in operations
            .iter()
            .filter(|op| op.status == OperationStatus::Completed)
        {
            self.inner.store.remove_operation(&operation.id).await?;
            removed += 1;
        }
        debug!(removed, "removed completed operations");
        Ok(removed)
    }

    /// Clears every operation and entity snapshot, in the store and the cache.
    ///
    /// Entity listeners are not notified.
    ///
    /// # Errors
    ///
    /// Returns an error if the store call fails. The cache is left as it was.
    pub async fn clean_storage(&self) -> EngineResult<()> {
        self.inner.store.clean_storage().await?;
        self.inner.cache.clear();
        debug!("cleaned storage");
        Ok(())
    }

    /// Registers a lifecycle listener.
    pub fn add_listener<F>(&self, kind: SyncEventKind, callback: F) -> ListenerId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        self.inner.events.add_listener(kind, Arc::new(callback))
    }

    /// Removes a lifecycle listener. Unknown ids are ignored.
    pub fn remove_listener(&self, kind: SyncEventKind, id: ListenerId) {
        self.inner.events.remove_listener(kind, id);
    }

    /// Registers a listener for snapshots of one entity type.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownEntityType`] if the entity type is not
    /// in the registry.
    pub fn add_entity_listener<F>(
        &self,
        entity_type: &str,
        callback: F,
    ) -> EngineResult<ListenerId>
    where
        F: Fn(&[Entity]) + Send + Sync + 'static,
    {
        self.inner
            .events
            .add_entity_listener(entity_type, Arc::new(callback))
    }

    /// Removes an entity listener. Unknown types and ids are ignored.
    pub fn remove_entity_listener(&self, entity_type: &str, id: ListenerId) {
        self.inner.events.remove_entity_listener(entity_type, id);
    }

    /// Returns the number of lifecycle listeners for an event kind.
    pub fn listener_count(&self, kind: SyncEventKind) -> usize {
        self.inner.events.listener_count(kind)
    }

    /// Returns the number of listeners for an entity type.
    pub fn entity_listener_count(&self, entity_type: &str) -> usize {
        self.inner.events.entity_listener_count(entity_type)
    }
}

impl<S: SyncStore> Inner<S> {
    fn set_status(&self, status: EngineStatus) {
        *self.status.write() = status;
        self.events.emit(&SyncEvent::StatusChange(status));
    }

    async fn sync(&self) {
        let Ok(_cycle) = self.cycle.try_lock() else {
            debug!("sync already in progress, skipping");
            return;
        };

        self.set_status(EngineStatus::Syncing);
        self.events.emit(&SyncEvent::SyncStart);

        let operations = match self.store.get_operations().await {
            Ok(operations) => operations,
            Err(e) => {
                self.fail_cycle(e.into());
                return;
            }
        };

        let batch: Vec<Operation> = operations
            .into_iter()
            .filter(Operation::is_pending)
            .take(self.config.batch_size)
            .collect();
        debug!(batch = batch.len(), "processing pending operations");

        for operation in &batch {
            match self.apply(operation).await {
                Ok(applied) => {
                    if applied.status == OperationStatus::Completed {
                        self.stats.write().operations_completed += 1;
                    }
                    self.events.emit(&SyncEvent::OperationComplete(applied));
                }
                Err(e) => self.record_failure(operation, &e).await,
            }
        }

        {
            let mut stats = self.stats.write();
            stats.cycles_completed += 1;
            stats.last_sync_time = Some(SystemTime::now());
        }
        let next = if self.offline.load(Ordering::SeqCst) {
            EngineStatus::Offline
        } else {
            EngineStatus::Idle
        };
        self.set_status(next);
        self.events.emit(&SyncEvent::SyncComplete);
    }

    /// Applies one operation and returns it as persisted.
    async fn apply(&self, operation: &Operation) -> EngineResult<Operation> {
        let entity_type = operation.entity.as_str();
        let snapshot = self.cache.refresh(&*self.store, entity_type).await?;
        let updated = apply_to_snapshot(operation, snapshot)?;

        self.store
            .save_entities(entity_type, updated.clone())
            .await?;
        self.cache.put(entity_type, updated.clone());
        self.events.emit_entities(entity_type, &updated);

        let mut applied = operation.clone();
        if self.offline.load(Ordering::SeqCst) {
            debug!(operation_id = %operation.id, "engine offline, operation stays pending");
        } else {
            let patch = OperationPatch::status(OperationStatus::Completed);
            self.store.update_operation(&operation.id, patch).await?;
            patch.apply_to(&mut applied);
        }

        if self.config.debug {
            debug!(
                operation_id = %operation.id,
                entity = entity_type,
                op_type = %operation.op_type,
                status = %applied.status,
                "applied operation"
            );
        }
        Ok(applied)
    }

    async fn record_failure(&self, operation: &Operation, cause: &EngineError) {
        let retry_count = operation.retry_count.saturating_add(1);
        let exhausted = retry_count >= self.config.retry_limit;
        let retryable = cause.is_retryable();

        let patch = if exhausted {
            error!(
                operation_id = %operation.id,
                entity = %operation.entity,
                retry_count,
                retryable,
                error = %cause,
                "operation failed, retry limit reached"
            );
            OperationPatch::retry_count(retry_count).with_status(OperationStatus::Error)
        } else {
            warn!(
                operation_id = %operation.id,
                entity = %operation.entity,
                retry_count,
                retry_delay_ms = self.config.retry_delay.as_millis() as u64,
                retryable,
                error = %cause,
                "operation failed, will retry"
            );
            OperationPatch::retry_count(retry_count)
        };

        {
            let mut stats = self.stats.write();
            stats.operations_failed += 1;
            if exhausted {
                stats.operations_exhausted += 1;
            }
        }

        if let Err(e) = self.store.update_operation(&operation.id, patch).await {
            error!(
                operation_id = %operation.id,
                retry_count,
                error = %e,
                "failed to record retry count"
            );
        }
    }

    fn fail_cycle(&self, cause: EngineError) {
        error!(
            retryable = cause.is_retryable(),
            error = %cause,
            "sync cycle failed"
        );
        {
            let mut stats = self.stats.write();
            stats.cycles_failed += 1;
            stats.last_error = Some(cause.to_string());
        }
        self.set_status(EngineStatus::Error);
        self.events.emit(&SyncEvent::SyncError(Arc::new(cause)));
    }
}

async fn run_timer<S: SyncStore>(
    inner: Weak<Inner<S>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }

            _ = ticker.tick() => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                inner.sync().await;
            }
        }
    }
    debug!("sync timer exited");
}
