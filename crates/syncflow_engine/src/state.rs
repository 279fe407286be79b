//! Engine status and statistics.

use std::fmt;
use std::time::SystemTime;

/// The current status of a sync engine.
///
/// ```text
/// idle ──sync──▶ syncing ──▶ idle
///   ▲              │
///   │              └─list fails─▶ error ──sync──▶ syncing
///   └──start── offline ◀──stop── (any)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EngineStatus {
    /// Waiting for the next cycle.
    #[default]
    Idle,
    /// A reconciliation cycle is running.
    Syncing,
    /// The last cycle failed before processing operations.
    Error,
    /// The engine was stopped.
    Offline,
}

impl EngineStatus {
    /// Returns the lowercase status name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineStatus::Idle => "idle",
            EngineStatus::Syncing => "syncing",
            EngineStatus::Error => "error",
            EngineStatus::Offline => "offline",
        }
    }

    /// Returns true while a cycle is running.
    pub fn is_active(&self) -> bool {
        matches!(self, EngineStatus::Syncing)
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistics about reconciliation cycles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStats {
    /// Cycles that ran to completion.
    pub cycles_completed: u64,
    /// Cycles aborted because operations could not be listed.
    pub cycles_failed: u64,
    /// Operations applied and marked completed.
    pub operations_completed: u64,
    /// Failed apply attempts.
    pub operations_failed: u64,
    /// Operations that reached the retry limit.
    pub operations_exhausted: u64,
    /// End of the last completed cycle.
    pub last_sync_time: Option<SystemTime>,
    /// Message of the last cycle-level failure.
    pub last_error: Option<String>,
}
