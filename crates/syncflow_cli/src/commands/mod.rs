//! CLI command implementations.

pub mod enqueue;
pub mod queue;
pub mod sync;

use std::path::Path;
use std::sync::Arc;
use syncflow_engine::{SyncConfig, SyncEngine};
use syncflow_store::{FileStore, Operation};

/// Reads an engine configuration from a JSON file.
pub fn load_config(path: &Path) -> Result<SyncConfig, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path)
        .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
    let config: SyncConfig = serde_json::from_slice(&bytes)?;
    config.validate()?;
    Ok(config)
}

/// Opens the queue directory and builds an engine over it.
pub fn open_engine(
    path: &Path,
    config: SyncConfig,
) -> Result<SyncEngine<FileStore>, Box<dyn std::error::Error>> {
    let store = FileStore::open(path)?;
    Ok(SyncEngine::new(Arc::new(store), config)?)
}

/// Prints operations as one line each.
pub(crate) fn print_operations(operations: &[Operation]) {
    for op in operations {
        println!(
            "{}  {:<6}  {:<16}  {:<9}  retries={}",
            op.id,
            op.op_type.as_str(),
            op.entity,
            op.status.as_str(),
            op.retry_count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"retryLimit": 4, "syncInterval": 100, "entityTypes": ["todo"]}"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.retry_limit, 4);
        assert_eq!(config.sync_interval, Duration::from_millis(100));
        assert_eq!(config.entity_types, vec!["todo"]);
    }

    #[test]
    fn load_config_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"batchSize": 0}"#).unwrap();

        assert!(load_config(&path).is_err());
        assert!(load_config(&dir.path().join("missing.json")).is_err());
    }
}
