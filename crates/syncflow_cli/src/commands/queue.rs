//! Queue inspection and maintenance commands.

use super::print_operations;
use serde_json::json;
use syncflow_engine::SyncEngine;
use syncflow_store::FileStore;

/// Lists pending operations.
pub async fn pending(
    engine: &SyncEngine<FileStore>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let operations = engine.get_pending_operations().await?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&operations)?);
        }
        _ => {
            if operations.is_empty() {
                println!("No pending operations");
            } else {
                print_operations(&operations);
                println!("{} pending", operations.len());
            }
        }
    }

    Ok(())
}

/// Removes pending operations and prints what was removed.
pub async fn purge(
    engine: &SyncEngine<FileStore>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let removed = engine.remove_pending_operations().await?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&removed)?);
        }
        _ => {
            print_operations(&removed);
            println!("Removed {} pending operation(s)", removed.len());
        }
    }

    Ok(())
}

/// Removes completed operations.
pub async fn cleanup(engine: &SyncEngine<FileStore>) -> Result<(), Box<dyn std::error::Error>> {
    let removed = engine.cleanup_completed_operations().await?;
    println!("Removed {removed} completed operation(s)");
    Ok(())
}

/// Shows the snapshot of one entity type.
pub async fn entities(
    engine: &SyncEngine<FileStore>,
    entity_type: &str,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if !engine.entity_types().is_empty()
        && !engine.entity_types().iter().any(|t| t == entity_type)
    {
        tracing::warn!(entity_type, "entity type is not in the configured registry");
    }

    let entities = engine.get_entities(entity_type).await?;

    match format {
        "json" => {
            let output = json!({
                "entityType": entity_type,
                "count": entities.len(),
                "entities": entities,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            println!("{entity_type}: {} entit(ies)", entities.len());
            for entity in &entities {
                println!("  {}", serde_json::to_string(entity)?);
            }
        }
    }

    Ok(())
}

/// Removes every operation and snapshot.
pub async fn clean(engine: &SyncEngine<FileStore>) -> Result<(), Box<dyn std::error::Error>> {
    engine.clean_storage().await?;
    println!("Removed all operations and snapshots");
    Ok(())
}
