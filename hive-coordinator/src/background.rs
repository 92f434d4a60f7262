//! The two housekeeping loops that run for the coordinator's whole lifetime.

use std::sync::Arc;
use std::time::Duration;

use hive_queue::QueueStore;
use tracing::error;
use tracing::info;

const STALE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const RATE_SAMPLE_INTERVAL: Duration = Duration::from_secs(10);

/// Every [`STALE_SWEEP_INTERVAL`], return over-age `assigned` tasks to
/// `pending`. A single failed sweep is logged and does not stop the loop.
pub fn spawn_stale_sweeper(queue: Arc<QueueStore>, stale_minutes: i64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(STALE_SWEEP_INTERVAL).await;
            match queue.recover_stale(stale_minutes).await {
                Ok(0) => {}
                Ok(recovered) => info!(recovered, "recovered stale tasks"),
                Err(err) => error!(error = %err, "stale sweep failed"),
            }
        }
    })
}

/// Every [`RATE_SAMPLE_INTERVAL`], record a `(now, done_count)` sample that
/// [`hive_queue::QueueStore::get_rate_info`] later derives rate/ETA from.
pub fn spawn_rate_snapshotter(queue: Arc<QueueStore>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(RATE_SAMPLE_INTERVAL).await;
            if let Err(err) = queue.log_rate().await {
                error!(error = %err, "rate snapshot failed");
            }
        }
    })
}
