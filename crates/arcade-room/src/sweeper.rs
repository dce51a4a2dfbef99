//! Background cleanup task.

use std::sync::Arc;

use arcade_timer::Sweep;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::RoomManager;

/// Spawns the sweeper: every `sweep_interval` of the manager's config it
/// runs [`RoomManager::sweep`]. Abort the returned handle to stop it.
pub fn spawn_sweeper(manager: Arc<RoomManager>) -> JoinHandle<()> {
    let mut sweep = Sweep::new(manager.config().sweep_interval);
    info!(period_ms = sweep.period().as_millis() as u64, "sweeper started");

    tokio::spawn(async move {
        loop {
            let pass = sweep.tick().await;
            let report = manager.sweep().await;
            debug!(
                pass,
                rooms = report.rooms_reclaimed,
                queue_entries = report.queue_entries_dropped,
                "sweep pass complete"
            );
        }
    })
}
