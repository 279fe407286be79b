//! Error types for the reconciliation engine.

use syncflow_store::StoreError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in the reconciliation engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A listener was registered for an entity type outside the registry.
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    /// A context was built without any entity types.
    #[error("no entity types configured")]
    MissingEntityTypes,

    /// An operation payload cannot be applied to its snapshot.
    #[error("invalid payload for operation {operation_id}: {reason}")]
    InvalidPayload {
        /// Operation ID.
        operation_id: String,
        /// Why the payload was rejected.
        reason: String,
    },

    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The engine timer needs a Tokio runtime.
    #[error("no tokio runtime available")]
    NoRuntime,
}

impl EngineError {
    /// Creates an `InvalidPayload` error.
    pub fn invalid_payload(operation_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            operation_id: operation_id.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if a later cycle may succeed where this one failed.
    ///
    /// The engine retries every failure up to the retry limit; this only
    /// classifies the failure in its logs.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Store(e) => e.is_transient(),
            EngineError::InvalidPayload { .. } => true,
            _ => false,
        }
    }
}
