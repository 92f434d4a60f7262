//! The worker: registers with the coordinator, leases batches of tasks,
//! fans them out across a bounded pool of blocking extraction tasks, and
//! reports results and telemetry back.

mod client;
mod process;
mod run;
mod telemetry;

pub use client::CoordinatorClient;
pub use run::WorkerConfig;
pub use run::run;

/// Per-task extraction wall-clock budget (see the coordinator's mirrored
/// constant for the file-proxy I/O budget).
pub const EXTRACTION_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(90);
/// Timeout for downloading input bytes through the file proxy.
pub const DOWNLOAD_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);
/// How long a single task result is allowed to wait before the worker
/// synthesizes a failure in its place.
pub const EMPTY_PULL_SLEEP: std::time::Duration = std::time::Duration::from_secs(5);
/// How long the worker waits after a connection error before retrying.
pub const CONNECTION_ERROR_SLEEP: std::time::Duration = std::time::Duration::from_secs(10);
/// How long the worker waits between registration retries.
pub const REGISTER_RETRY_SLEEP: std::time::Duration = std::time::Duration::from_secs(5);
/// Failure messages reported back to the coordinator are truncated to this
/// many characters, matching the original implementation's `str[:200]`.
pub const ERROR_MESSAGE_TRUNCATE: usize = 200;

pub(crate) fn truncate_error(message: impl Into<String>) -> String {
    let message = message.into();
    if message.chars().count() <= ERROR_MESSAGE_TRUNCATE {
        message
    } else {
        message.chars().take(ERROR_MESSAGE_TRUNCATE).collect()
    }
}
