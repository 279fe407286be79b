//! Sync and run command implementations.

use serde::Serialize;
use std::time::UNIX_EPOCH;
use syncflow_engine::{EngineResult, SyncEngine};
use syncflow_store::FileStore;
use tracing::info;

/// Summary printed after reconciliation.
#[derive(Debug, Serialize)]
pub struct SyncReport {
    /// Cycles requested by the command.
    pub cycles: u64,
    /// Engine status when the report was taken.
    pub status: String,
    /// Cycles that finished listing and applying.
    pub cycles_completed: u64,
    /// Cycles aborted by a store failure.
    pub cycles_failed: u64,
    /// Operations marked completed.
    pub operations_completed: u64,
    /// Failed attempts.
    pub operations_failed: u64,
    /// Operations that used up their retries.
    pub operations_exhausted: u64,
    /// Operations still pending.
    pub pending: usize,
    /// Last successful cycle, in milliseconds since the Unix epoch.
    pub last_sync_ms: Option<u64>,
    /// Last cycle-level error.
    pub last_error: Option<String>,
}

impl SyncReport {
    async fn collect(engine: &SyncEngine<FileStore>, cycles: u64) -> EngineResult<Self> {
        let stats = engine.stats();
        let pending = engine.get_pending_operations().await?.len();
        let last_sync_ms = stats
            .last_sync_time
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64);

        Ok(Self {
            cycles,
            status: engine.status().as_str().to_string(),
            cycles_completed: stats.cycles_completed,
            cycles_failed: stats.cycles_failed,
            operations_completed: stats.operations_completed,
            operations_failed: stats.operations_failed,
            operations_exhausted: stats.operations_exhausted,
            pending,
            last_sync_ms,
            last_error: stats.last_error,
        })
    }

    fn print(&self, format: &str) -> Result<(), Box<dyn std::error::Error>> {
        match format {
            "json" => {
                println!("{}", serde_json::to_string_pretty(self)?);
            }
            _ => {
                println!("Sync Report");
                println!("===========");
                println!("Status:                {}", self.status);
                println!(
                    "Cycles:                {} completed, {} failed",
                    self.cycles_completed, self.cycles_failed
                );
                println!("Operations completed:  {}", self.operations_completed);
                println!("Failed attempts:       {}", self.operations_failed);
                println!("Retries exhausted:     {}", self.operations_exhausted);
                println!("Still pending:         {}", self.pending);
                if let Some(error) = &self.last_error {
                    println!("Last error:            {error}");
                }
            }
        }
        Ok(())
    }
}

/// Runs the sync command.
pub async fn run(
    engine: &SyncEngine<FileStore>,
    cycles: usize,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    for cycle in 1..=cycles {
        info!(cycle, "running sync cycle");
        engine.sync().await;
    }

    let report = SyncReport::collect(engine, cycles as u64).await?;
    report.print(format)
}

/// Runs the engine timer until Ctrl-C.
pub async fn run_until_interrupted(
    engine: &SyncEngine<FileStore>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    engine.start()?;
    info!(
        interval_ms = engine.config().sync_interval.as_millis() as u64,
        "engine running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    engine.stop();
    info!("engine stopped");

    let stats = engine.stats();
    let report = SyncReport::collect(engine, stats.cycles_completed + stats.cycles_failed).await?;
    report.print(format)
}
