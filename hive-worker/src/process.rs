//! Single-task processing: acquire input bytes, run extraction, deliver
//! output. See SPEC_FULL.md §4.5.a.

use std::path::Path;
use std::path::PathBuf;

use hive_extract::ExtractionBackend;
use hive_extract::ExtractionOutcome;
use hive_protocol::LeasedTask;
use hive_protocol::TaskResult;
use hive_protocol::TaskStatus;

use crate::client::CoordinatorClient;
use crate::truncate_error;

/// Per-worker configuration a single task is processed under.
pub struct ProcessConfig<'a> {
    pub client: &'a CoordinatorClient,
    pub backend: &'a dyn ExtractionBackend,
    pub local_input_dir: Option<&'a str>,
    pub local_output_dir: Option<&'a str>,
}

pub async fn process_one(task: &LeasedTask, config: &ProcessConfig<'_>) -> TaskResult {
    match process_one_fallible(task, config).await {
        Ok(result) => result,
        Err(err) => TaskResult {
            task_id: task.task_id,
            status: TaskStatus::Failed,
            method: None,
            char_count: 0,
            error: Some(truncate_error(err)),
        },
    }
}

async fn process_one_fallible(
    task: &LeasedTask,
    config: &ProcessConfig<'_>,
) -> anyhow::Result<TaskResult> {
    let (local_input, downloaded_input) = acquire_input(task, config).await?;
    let (local_output, output_is_temp) = resolve_output_path(task, config)?;

    let outcome = config.backend.extract(&local_input, &local_output).await;

    deliver_output(task, config, &outcome, &local_output, output_is_temp).await?;

    if downloaded_input {
        let _ = tokio::fs::remove_file(&local_input).await;
    }

    Ok(to_task_result(task.task_id, outcome))
}

/// Returns the local path extraction should read from, and whether that
/// path is a temp file this function downloaded (and is therefore
/// responsible for cleaning up).
async fn acquire_input(
    task: &LeasedTask,
    config: &ProcessConfig<'_>,
) -> anyhow::Result<(PathBuf, bool)> {
    if config.local_input_dir.is_some() {
        return Ok((PathBuf::from(&task.input_path), false));
    }

    let response = config.client.download_input(task.task_id).await?;
    if !response.status().is_success() {
        anyhow::bail!("download failed: HTTP {}", response.status().as_u16());
    }
    let bytes = response.bytes().await?;
    let tmp = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()?
        .into_temp_path();
    tokio::fs::write(&tmp, &bytes).await?;
    Ok((tmp.keep()?, true))
}

/// Returns the local path extraction should write to, and whether it's a
/// temp file whose upload-then-delete lifecycle `deliver_output` owns.
fn resolve_output_path(
    task: &LeasedTask,
    config: &ProcessConfig<'_>,
) -> anyhow::Result<(PathBuf, bool)> {
    match config.local_output_dir {
        Some(dir) => {
            let relative = relative_output_suffix(&task.input_path);
            Ok((Path::new(dir).join(relative), false))
        }
        None => {
            let tmp = tempfile::Builder::new()
                .suffix(".txt")
                .tempfile()?
                .into_temp_path();
            Ok((tmp.keep()?, true))
        }
    }
}

/// Mirrors the original implementation's brittle derivation rule: find the
/// literal path segment `pdfs` and keep everything after it; fall back to
/// the bare filename when that segment is absent. SPEC_FULL.md §9 notes
/// this should be replaced with a coordinator-supplied relative suffix in a
/// future revision, but keeps it as the binding behavior for now.
fn relative_output_suffix(input_path: &str) -> PathBuf {
    let normalized = input_path.replace('\\', "/");
    let parts: Vec<&str> = normalized.split('/').collect();
    let relative = match parts.iter().position(|segment| *segment == "pdfs") {
        Some(idx) => parts[idx + 1..].join("/"),
        None => Path::new(input_path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| input_path.to_string()),
    };
    Path::new(&relative).with_extension("txt")
}

async fn deliver_output(
    task: &LeasedTask,
    config: &ProcessConfig<'_>,
    outcome: &ExtractionOutcome,
    local_output: &Path,
    output_is_temp: bool,
) -> anyhow::Result<()> {
    if !output_is_temp || !outcome.done {
        return Ok(());
    }
    if let Ok(bytes) = tokio::fs::read(local_output).await {
        config.client.upload_output(task.task_id, bytes).await?;
    }
    let _ = tokio::fs::remove_file(local_output).await;
    Ok(())
}

fn to_task_result(task_id: i64, outcome: ExtractionOutcome) -> TaskResult {
    TaskResult {
        task_id,
        status: if outcome.done {
            TaskStatus::Done
        } else {
            TaskStatus::Failed
        },
        method: if outcome.method.is_empty() {
            None
        } else {
            Some(outcome.method)
        },
        char_count: outcome.char_count,
        error: outcome.error,
    }
}
