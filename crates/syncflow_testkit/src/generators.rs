//! Property-based test generators using proptest.
//!
//! Provides strategies for generating operations and payloads that always
//! carry an `id`, so every generated operation can be applied.

use proptest::prelude::*;
use serde_json::{Map, Value};
use syncflow_store::{NewOperation, OperationStatus, OperationType};

/// Strategy for generating entity-type names.
pub fn entity_type_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating entity ids.
pub fn entity_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9]{1,8}").expect("Invalid regex")
}

/// Strategy for generating scalar JSON field values.
pub fn field_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| Value::from(n)),
        prop::string::string_regex("[a-zA-Z ]{0,16}")
            .expect("Invalid regex")
            .prop_map(Value::String),
        Just(Value::Null),
    ]
}

/// Strategy for generating an object payload with the given id.
pub fn payload_strategy(id: String) -> impl Strategy<Value = Value> {
    prop::collection::btree_map(
        prop::string::string_regex("[a-z]{1,8}").expect("Invalid regex"),
        field_value_strategy(),
        0..4,
    )
    .prop_map(move |fields| {
        let mut map: Map<String, Value> = fields.into_iter().collect();
        map.insert("id".into(), Value::String(id.clone()));
        Value::Object(map)
    })
}

/// Strategy for generating operation types.
pub fn operation_type_strategy() -> impl Strategy<Value = OperationType> {
    prop_oneof![
        3 => Just(OperationType::Create),
        2 => Just(OperationType::Update),
        1 => Just(OperationType::Delete),
    ]
}

/// Strategy for generating operation statuses.
pub fn operation_status_strategy() -> impl Strategy<Value = OperationStatus> {
    prop_oneof![
        Just(OperationStatus::Pending),
        Just(OperationStatus::Completed),
        Just(OperationStatus::Error),
    ]
}

/// Strategy for generating a pending operation on one entity type.
pub fn new_operation_strategy(entity_type: &str) -> impl Strategy<Value = NewOperation> {
    let entity_type = entity_type.to_string();
    (operation_type_strategy(), entity_id_strategy())
        .prop_flat_map(|(op_type, id)| (Just(op_type), payload_strategy(id)))
        .prop_map(move |(op_type, data)| NewOperation::pending(op_type, entity_type.clone(), data))
}

/// Strategy for generating a batch of pending operations.
pub fn operation_batch_strategy(
    entity_type: &str,
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<NewOperation>> {
    prop::collection::vec(new_operation_strategy(entity_type), min_ops..max_ops)
}

/// Strategy for generating operations in arbitrary statuses and retry counts.
pub fn stored_operation_strategy(
    entity_type: &str,
    max_retries: u32,
) -> impl Strategy<Value = NewOperation> {
    (
        new_operation_strategy(entity_type),
        operation_status_strategy(),
        0..=max_retries,
    )
        .prop_map(|(op, status, retry_count)| op.with_status(status).with_retry_count(retry_count))
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
