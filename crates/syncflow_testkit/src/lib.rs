//! # SyncFlow Testkit
//!
//! Test utilities for SyncFlow.
//!
//! This crate provides:
//! - Payload builders and seeded stores
//! - A fault-injecting store wrapper
//! - A store that detects overlapping operation fetches
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use syncflow_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn completion_failure_is_retried() {
//!     let store = FaultyStore::new(MemoryStore::new());
//!     store.enable(Fault::CompleteOperation);
//!     // ... build an engine over the store
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faulty;
pub mod fixtures;
pub mod generators;
pub mod slow;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faulty::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::slow::*;
    pub use syncflow_store::{MemoryStore, SyncStore};
}

pub use faulty::*;
pub use fixtures::*;
pub use generators::*;
pub use slow::*;
