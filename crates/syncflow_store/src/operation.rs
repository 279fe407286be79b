//! Queued operations and entity records.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// An entity record.
///
/// Entities are opaque JSON objects. The only field SyncFlow looks at is
/// `id`, which identifies the entity within its entity type.
pub type Entity = serde_json::Map<String, Value>;

/// Returns the `id` field of an entity, if present.
pub fn entity_id(entity: &Entity) -> Option<&Value> {
    entity.get("id")
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Kind of mutation an operation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    /// Append the payload to the entity-type snapshot.
    Create,
    /// Shallow-merge the payload into the entity with the same id.
    Update,
    /// Remove the entity with the payload's id.
    Delete,
}

impl OperationType {
    /// Returns the lowercase name used in persisted records.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Create => "create",
            OperationType::Update => "update",
            OperationType::Delete => "delete",
        }
    }

    /// Parses a lowercase operation name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "create" => Some(OperationType::Create),
            "update" => Some(OperationType::Update),
            "delete" => Some(OperationType::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconciliation status of an operation.
///
/// Valid transitions are `Pending -> Completed`, `Pending -> Pending`
/// (retry) and `Pending -> Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    /// Waiting to be applied.
    Pending,
    /// Applied and acknowledged.
    Completed,
    /// Retry limit reached; never selected again.
    Error,
}

impl OperationStatus {
    /// Returns the lowercase name used in persisted records.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Completed => "completed",
            OperationStatus::Error => "error",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued mutation intent.
///
/// `id` and `timestamp` are assigned by the store on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Unique operation ID.
    pub id: String,
    /// Mutation kind.
    #[serde(rename = "type")]
    pub op_type: OperationType,
    /// Entity type the mutation targets.
    pub entity: String,
    /// Caller-owned payload.
    pub data: Value,
    /// Reconciliation status.
    pub status: OperationStatus,
    /// Number of failed apply attempts.
    #[serde(default)]
    pub retry_count: u32,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl Operation {
    /// Returns true if the operation is waiting to be applied.
    pub fn is_pending(&self) -> bool {
        self.status == OperationStatus::Pending
    }
}

/// An operation before the store assigns its `id` and `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOperation {
    /// Mutation kind.
    #[serde(rename = "type")]
    pub op_type: OperationType,
    /// Entity type the mutation targets.
    pub entity: String,
    /// Caller-owned payload.
    pub data: Value,
    /// Initial status.
    pub status: OperationStatus,
    /// Initial retry count.
    #[serde(default)]
    pub retry_count: u32,
}

impl NewOperation {
    /// Creates a pending operation with no failed attempts.
    pub fn pending(op_type: OperationType, entity: impl Into<String>, data: Value) -> Self {
        Self {
            op_type,
            entity: entity.into(),
            data,
            status: OperationStatus::Pending,
            retry_count: 0,
        }
    }

    /// Sets the initial status.
    pub fn with_status(mut self, status: OperationStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the initial retry count.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Completes the operation with a store-assigned id and timestamp.
    pub fn into_operation(self, id: String, timestamp: u64) -> Operation {
        Operation {
            id,
            op_type: self.op_type,
            entity: self.entity,
            data: self.data,
            status: self.status,
            retry_count: self.retry_count,
            timestamp,
        }
    }
}

/// A partial update merged into a stored operation.
///
/// Unset fields leave the stored value untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationPatch {
    /// New status.
    pub status: Option<OperationStatus>,
    /// New retry count.
    pub retry_count: Option<u32>,
}

impl OperationPatch {
    /// A patch that only changes the status.
    pub fn status(status: OperationStatus) -> Self {
        Self {
            status: Some(status),
            retry_count: None,
        }
    }

    /// A patch that only changes the retry count.
    pub fn retry_count(retry_count: u32) -> Self {
        Self {
            status: None,
            retry_count: Some(retry_count),
        }
    }

    /// Also sets the status.
    pub fn with_status(mut self, status: OperationStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Merges the set fields into `operation`.
    pub fn apply_to(&self, operation: &mut Operation) {
        if let Some(status) = self.status {
            operation.status = status;
        }
        if let Some(retry_count) = self.retry_count {
            operation.retry_count = retry_count;
        }
    }
}
