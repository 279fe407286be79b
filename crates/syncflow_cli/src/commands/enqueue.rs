//! Enqueue command implementation.

use serde_json::Value;
use syncflow_store::{FileStore, NewOperation, OperationType, SyncStore};

/// Runs the enqueue command.
pub async fn run(
    store: &FileStore,
    op_type: &str,
    entity: &str,
    data: &str,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let operation = parse(op_type, entity, data)?;
    let operation = store.add_operation(operation).await?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&operation)?);
        }
        _ => {
            println!(
                "Enqueued {} on {} as {}",
                operation.op_type, operation.entity, operation.id
            );
        }
    }

    Ok(())
}

/// Builds a pending operation from command-line arguments.
pub fn parse(
    op_type: &str,
    entity: &str,
    data: &str,
) -> Result<NewOperation, Box<dyn std::error::Error>> {
    let op_type = OperationType::parse(op_type).ok_or_else(|| {
        format!("Unknown operation type '{op_type}' (expected create, update or delete)")
    })?;
    if entity.is_empty() {
        return Err("Entity type must not be empty".into());
    }

    let data: Value = serde_json::from_str(data)?;
    if !data.is_object() {
        return Err("Operation data must be a JSON object".into());
    }
    if op_type != OperationType::Create && data.get("id").is_none() {
        return Err(format!("A {op_type} payload needs an \"id\" field").into());
    }

    Ok(NewOperation::pending(op_type, entity, data))
}
