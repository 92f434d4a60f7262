//! The worker's steady-state loop: register, then repeatedly lease a batch,
//! extract in parallel, report, and push telemetry. See SPEC_FULL.md §4.5.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use hive_extract::ExtractionBackend;
use hive_extract::PlainTextBackend;
use hive_protocol::LeasedTask;
use hive_protocol::TaskResult;
use hive_protocol::TaskStatus;
use tokio::sync::Semaphore;
use tracing::info;
use tracing::warn;

use crate::CoordinatorClient;
use crate::CONNECTION_ERROR_SLEEP;
use crate::EMPTY_PULL_SLEEP;
use crate::EXTRACTION_TIMEOUT;
use crate::REGISTER_RETRY_SLEEP;
use crate::process::ProcessConfig;
use crate::process::process_one;
use crate::telemetry;
use crate::truncate_error;

pub struct WorkerConfig {
    pub coordinator: String,
    pub cpus: u32,
    pub batch_size: u32,
    pub local_input_dir: Option<String>,
    pub local_output_dir: Option<String>,
    pub name: String,
}

impl WorkerConfig {
    /// Resolve `cpus == 0` to the available parallelism, matching the
    /// original implementation's `os.cpu_count() or 4` fallback.
    fn resolved_cpus(&self) -> usize {
        if self.cpus > 0 {
            self.cpus as usize
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4)
        }
    }
}

/// Run the worker loop until `shutdown` resolves. The batch in flight when
/// shutdown is requested is always allowed to finish; only the *next* pull
/// is skipped.
pub async fn run(
    config: WorkerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let shutdown_requested = Arc::new(AtomicBool::new(false));
    {
        let shutdown_requested = shutdown_requested.clone();
        tokio::spawn(async move {
            shutdown.await;
            shutdown_requested.store(true, Ordering::SeqCst);
        });
    }

    let client = CoordinatorClient::new(&config.coordinator);
    let backend: Arc<dyn ExtractionBackend> = Arc::new(PlainTextBackend);
    let cpus = config.resolved_cpus();

    info!(
        worker = %config.name,
        coordinator = %config.coordinator,
        cpus,
        batch_size = config.batch_size,
        "starting worker"
    );

    register_with_retry(&client, &config, cpus as u32, &shutdown_requested).await;

    let mut consecutive_empty = 0u32;
    while !shutdown_requested.load(Ordering::SeqCst) {
        match client.pull(&config.name, config.batch_size).await {
            Ok(tasks) if tasks.is_empty() => {
                consecutive_empty += 1;
                if consecutive_empty == 1 {
                    info!(worker = %config.name, "no tasks available, waiting");
                }
                tokio::time::sleep(EMPTY_PULL_SLEEP).await;
            }
            Ok(tasks) => {
                consecutive_empty = 0;
                info!(worker = %config.name, count = tasks.len(), "leased batch");
                let results =
                    process_batch(tasks, &client, &backend, &config, cpus, &shutdown_requested)
                        .await;
                report_and_push_stats(&client, &config, results).await;
            }
            Err(err) => {
                warn!(worker = %config.name, error = %err, "lost connection, retrying");
                tokio::time::sleep(CONNECTION_ERROR_SLEEP).await;
            }
        }
    }

    info!(worker = %config.name, "shutdown complete");
    Ok(())
}

async fn register_with_retry(
    client: &CoordinatorClient,
    config: &WorkerConfig,
    resolved_cpus: u32,
    shutdown_requested: &AtomicBool,
) {
    while !shutdown_requested.load(Ordering::SeqCst) {
        match client.register(&config.name, resolved_cpus).await {
            Ok(response) if response.status().is_success() => {
                info!(worker = %config.name, "registered with coordinator");
                return;
            }
            Ok(response) => {
                warn!(worker = %config.name, status = %response.status(), "registration rejected, retrying");
            }
            Err(err) => {
                warn!(worker = %config.name, error = %err, "coordinator not reachable, retrying in 5s");
            }
        }
        tokio::time::sleep(REGISTER_RETRY_SLEEP).await;
    }
}

/// Fan out extraction across a bounded pool sized to `cpus`. Each unit
/// enforces the per-task wall-clock budget; a unit that doesn't yield a
/// result in time is reported as a synthetic failure rather than left to
/// block the batch indefinitely.
async fn process_batch(
    tasks: Vec<LeasedTask>,
    client: &CoordinatorClient,
    backend: &Arc<dyn ExtractionBackend>,
    config: &WorkerConfig,
    cpus: usize,
    shutdown_requested: &AtomicBool,
) -> Vec<TaskResult> {
    let semaphore = Arc::new(Semaphore::new(cpus.max(1)));
    let mut handles = Vec::with_capacity(tasks.len());

    for task in tasks {
        let outer_task_id = task.task_id;
        let semaphore = semaphore.clone();
        let client = client.clone();
        let backend = backend.clone();
        let local_input_dir = config.local_input_dir.clone();
        let local_output_dir = config.local_output_dir.clone();

        handles.push((outer_task_id, tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                unreachable!("semaphore is never closed")
            };
            let task_id = task.task_id;
            let process_config = ProcessConfig {
                client: &client,
                backend: backend.as_ref(),
                local_input_dir: local_input_dir.as_deref(),
                local_output_dir: local_output_dir.as_deref(),
            };
            match tokio::time::timeout(EXTRACTION_TIMEOUT, process_one(&task, &process_config))
                .await
            {
                Ok(result) => result,
                Err(_) => TaskResult {
                    task_id,
                    status: TaskStatus::Failed,
                    method: None,
                    char_count: 0,
                    error: Some(truncate_error(format!(
                        "extraction exceeded {EXTRACTION_TIMEOUT:?} wall-clock budget"
                    ))),
                },
            }
        })));
    }

    // Mirrors the original's `as_completed` loop: shutdown is observed
    // between result collections, not just between batches. A task whose
    // result isn't collected here is left running to completion in the
    // background; it stays `assigned` and the stale sweeper reclaims it.
    let mut results = Vec::with_capacity(handles.len());
    for (task_id, handle) in handles {
        if shutdown_requested.load(Ordering::SeqCst) {
            break;
        }
        match handle.await {
            Ok(result) => results.push(result),
            Err(join_err) => results.push(TaskResult {
                task_id,
                status: TaskStatus::Failed,
                method: None,
                char_count: 0,
                error: Some(truncate_error(join_err.to_string())),
            }),
        }
    }
    results
}

async fn report_and_push_stats(
    client: &CoordinatorClient,
    config: &WorkerConfig,
    results: Vec<TaskResult>,
) {
    let done = results.iter().filter(|r| r.status == TaskStatus::Done).count();
    let failed = results.len() - done;

    match client.report(&config.name, results).await {
        Ok(()) => info!(worker = %config.name, done, failed, "reported batch"),
        Err(err) => warn!(worker = %config.name, error = %err, "failed to report results"),
    }

    if let Err(err) = client.push_stats(&config.name, telemetry::collect()).await {
        warn!(worker = %config.name, error = %err, "failed to push telemetry");
    }
}
