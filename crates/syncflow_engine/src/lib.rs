//! # SyncFlow Engine
//!
//! Reconciliation engine for the SyncFlow offline-first mutation queue.
//!
//! This crate provides:
//! - The engine status state machine (idle, syncing, error, offline)
//! - Bounded batch processing of pending operations
//! - Retry bookkeeping with a terminal `error` status
//! - A read-through entity cache
//! - Lifecycle and per-entity-type event listeners
//!
//! ## Architecture
//!
//! Every cycle follows the same steps:
//! 1. List the store's operations and keep the first `batch_size` pending ones
//! 2. Apply each to its entity-type snapshot and persist the result
//! 3. Mark it completed, or record the failure against its retry count
//!
//! Persistence is delegated to a [`SyncStore`](syncflow_store::SyncStore).
//!
//! ## Key Invariants
//!
//! - At most one cycle runs at a time per engine
//! - Pending operations are applied in queue order
//! - `retry_count` grows by exactly one per failed attempt
//! - An operation is `completed` only after its snapshot and status are both persisted
//! - A stopped engine applies operations but leaves them `pending`

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod context;
mod engine;
mod error;
mod events;
mod snapshot;
mod state;

pub use cache::EntityCache;
pub use config::SyncConfig;
pub use context::{ListenerGuard, SyncContext};
pub use engine::SyncEngine;
pub use error::{EngineError, EngineResult};
pub use events::{EntityCallback, EventBus, EventCallback, ListenerId, SyncEvent, SyncEventKind};
pub use snapshot::apply_to_snapshot;
pub use state::{EngineStatus, SyncStats};
