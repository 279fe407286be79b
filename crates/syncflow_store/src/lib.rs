//! # SyncFlow Store
//!
//! Store contract and storage backends for the SyncFlow mutation queue.
//!
//! This crate provides the persistence boundary of SyncFlow. A store keeps
//! two things durable:
//!
//! - the **operation log**: queued mutation intents with retry bookkeeping
//! - **entity snapshots**: one list of entities per entity type
//!
//! ## Design Principles
//!
//! - Stores do not interpret entity payloads
//! - Stores never retry; failures propagate to the caller
//! - Updates and removals of unknown operation ids are no-ops
//! - Must be `Send + Sync` so one store can back a running engine
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] - For testing and ephemeral queues
//! - [`FileStore`] - JSON files in a locked directory
//!
//! ## Example
//!
//! ```rust
//! use syncflow_store::{MemoryStore, NewOperation, OperationType, SyncStore};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = MemoryStore::new();
//! store
//!     .add_operation(NewOperation::pending(
//!         OperationType::Create,
//!         "todo",
//!         json!({"id": "t1", "title": "Write docs"}),
//!     ))
//!     .await
//!     .unwrap();
//! assert_eq!(store.get_operations().await.unwrap().len(), 1);
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod operation;
mod store;

pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use operation::{
    entity_id, now_millis, Entity, NewOperation, Operation, OperationPatch, OperationStatus,
    OperationType,
};
pub use store::{BoxFuture, SyncStore};
