use std::sync::Arc;
use std::time::Instant;

use hive_queue::QueueStore;
use hive_storage::Storage;

/// Shared state handed to every axum handler via `State<Arc<CoordinatorState>>`.
pub struct CoordinatorState {
    pub queue: Arc<QueueStore>,
    pub source: Arc<dyn Storage>,
    pub dest: Arc<dyn Storage>,
    pub started_at: Instant,
}

impl CoordinatorState {
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
