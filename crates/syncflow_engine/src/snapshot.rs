//! Applying operations to entity snapshots.

use crate::error::{EngineError, EngineResult};
use serde_json::Value;
use syncflow_store::{entity_id, Entity, Operation, OperationType};

/// Computes the snapshot that results from applying `operation`.
///
/// - `create` appends the payload
/// - `update` shallow-merges the payload into every entity with the same id
/// - `delete` drops every entity with the payload's id
///
/// Updates and deletes that match nothing leave the snapshot unchanged.
///
/// # Errors
///
/// Returns [`EngineError::InvalidPayload`] if the payload is not an object,
/// or if an update or delete payload has no `id`.
pub fn apply_to_snapshot(
    operation: &Operation,
    mut snapshot: Vec<Entity>,
) -> EngineResult<Vec<Entity>> {
    let payload = payload_object(operation)?;

    match operation.op_type {
        OperationType::Create => {
            snapshot.push(payload.clone());
        }
        OperationType::Update => {
            let id = required_id(operation, payload)?;
            for entity in snapshot.iter_mut().filter(|e| entity_id(e) == Some(id)) {
                for (key, value) in payload {
                    entity.insert(key.clone(), value.clone());
                }
            }
        }
        OperationType::Delete => {
            let id = required_id(operation, payload)?;
            snapshot.retain(|e| entity_id(e) != Some(id));
        }
    }

    Ok(snapshot)
}

fn payload_object(operation: &Operation) -> EngineResult<&Entity> {
    match &operation.data {
        Value::Object(map) => Ok(map),
        other => Err(EngineError::invalid_payload(
            &operation.id,
            format!("expected an object, got {}", json_kind(other)),
        )),
    }
}

fn required_id<'a>(operation: &Operation, payload: &'a Entity) -> EngineResult<&'a Value> {
    entity_id(payload).ok_or_else(|| EngineError::invalid_payload(&operation.id, "missing id"))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use syncflow_store::NewOperation;

    fn op(op_type: OperationType, data: Value) -> Operation {
        NewOperation::pending(op_type, "todo", data).into_operation("op-1".into(), 1)
    }

    fn entity(value: Value) -> Entity {
        value.as_object().cloned().unwrap()
    }

    fn todos() -> Vec<Entity> {
        vec![
            entity(json!({"id": "t1", "title": "A", "done": false})),
            entity(json!({"id": "t2", "title": "B", "done": false})),
        ]
    }

    #[test]
    fn create_appends() {
        let result = apply_to_snapshot(
            &op(OperationType::Create, json!({"id": "t3", "title": "C"})),
            todos(),
        )
        .unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result[2], entity(json!({"id": "t3", "title": "C"})));
    }

    #[test]
    fn update_merges_shallowly() {
        let result = apply_to_snapshot(
            &op(OperationType::Update, json!({"id": "t2", "done": true})),
            todos(),
        )
        .unwrap();

        assert_eq!(result[0], todos()[0]);
        assert_eq!(
            result[1],
            entity(json!({"id": "t2", "title": "B", "done": true}))
        );
    }

    #[test]
    fn update_without_match_is_unchanged() {
        let result = apply_to_snapshot(
            &op(OperationType::Update, json!({"id": "zz", "done": true})),
            todos(),
        )
        .unwrap();
        assert_eq!(result, todos());
    }

    #[test]
    fn delete_removes_matching() {
        let result =
            apply_to_snapshot(&op(OperationType::Delete, json!({"id": "t1"})), todos()).unwrap();
        assert_eq!(result, vec![todos()[1].clone()]);
    }

    #[test]
    fn ids_compare_as_json_values() {
        let snapshot = vec![entity(json!({"id": 1})), entity(json!({"id": "1"}))];
        let result =
            apply_to_snapshot(&op(OperationType::Delete, json!({"id": 1})), snapshot).unwrap();
        assert_eq!(result, vec![entity(json!({"id": "1"}))]);
    }

    #[test]
    fn invalid_payloads() {
        let create = op(OperationType::Create, json!("text"));
        let err = apply_to_snapshot(&create, todos()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPayload { .. }));
        assert!(err.to_string().contains("a string"));

        let update = op(OperationType::Update, json!({"done": true}));
        let err = apply_to_snapshot(&update, todos()).unwrap_err();
        assert!(err.to_string().contains("missing id"));

        let delete = op(OperationType::Delete, json!({}));
        let err = apply_to_snapshot(&delete, todos()).unwrap_err();
        match err {
            EngineError::InvalidPayload { operation_id, .. } => assert_eq!(operation_id, "op-1"),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
