//! Configuration for the reconciliation engine.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`SyncEngine`](crate::SyncEngine).
///
/// Deserializes from camelCase JSON with durations in milliseconds:
///
/// ```json
/// { "retryLimit": 5, "batchSize": 20, "syncInterval": 2000, "entityTypes": ["todo"] }
/// ```
///
/// Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// Failed attempts after which an operation is marked `error`.
    pub retry_limit: u32,
    /// Retry pacing hint. Retries happen on the next cycle regardless.
    #[serde(with = "millis")]
    pub retry_delay: Duration,
    /// Maximum number of pending operations applied per cycle.
    pub batch_size: usize,
    /// Whether `init` starts the timer.
    pub auto_start: bool,
    /// Whether to log every operation at debug level.
    pub debug: bool,
    /// The entity-type registry.
    pub entity_types: Vec<String>,
    /// Period of the reconciliation timer.
    #[serde(with = "millis")]
    pub sync_interval: Duration,
}

impl SyncConfig {
    /// Creates a configuration with default settings and the given entity types.
    pub fn new<I, T>(entity_types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            entity_types: entity_types.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sets the retry limit.
    pub fn with_retry_limit(mut self, limit: u32) -> Self {
        self.retry_limit = limit;
        self
    }

    /// Sets the retry delay hint.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Sets whether `init` starts the timer.
    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Enables verbose per-operation logging.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the timer period.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Adds an entity type to the registry.
    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        let entity_type = entity_type.into();
        if !self.entity_types.contains(&entity_type) {
            self.entity_types.push(entity_type);
        }
        self
    }

    /// Checks the configuration for values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the retry limit, batch size or
    /// sync interval is zero.
    pub fn validate(&self) -> EngineResult<()> {
        if self.retry_limit == 0 {
            return Err(EngineError::Config("retry_limit must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(EngineError::Config("batch_size must be at least 1".into()));
        }
        if self.sync_interval.is_zero() {
            return Err(EngineError::Config("sync_interval must be non-zero".into()));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry_limit: 3,
            retry_delay: Duration::from_millis(1000),
            batch_size: 10,
            auto_start: true,
            debug: false,
            entity_types: Vec::new(),
            sync_interval: Duration::from_millis(5000),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
