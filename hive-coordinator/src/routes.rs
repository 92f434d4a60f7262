//! The HTTP surface workers and the `status` CLI subcommand talk to.
//!
//! Every handler maps storage/queue failures onto a small set of status
//! codes: a missing task or file is a 404, anything else that goes wrong
//! underneath is a 500, logged at the point of failure so the response body
//! doesn't need to carry diagnostic detail.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::ConnectInfo;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::routing::post;
use hive_protocol::HealthResponse;
use hive_protocol::LeasedTask;
use hive_protocol::PullRequest;
use hive_protocol::RegisterWorkerRequest;
use hive_protocol::RegisterWorkerResponse;
use hive_protocol::ReportRequest;
use hive_protocol::ReportResponse;
use hive_protocol::StatusCounts;
use hive_protocol::TaskStatsResponse;
use hive_protocol::UploadResponse;
use hive_protocol::WorkerStatsRequest;
use hive_protocol::WorkerStatsResponse;
use hive_protocol::WorkerView;
use tracing::error;

use crate::state::CoordinatorState;

pub fn router(state: Arc<CoordinatorState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/workers/register", post(register_worker))
        .route("/workers", get(list_workers))
        .route("/workers/stats", post(worker_stats))
        .route("/tasks/pull", post(pull_tasks))
        .route("/tasks/report", post(report_tasks))
        .route("/tasks/stats", get(task_stats))
        .route("/files/{task_id}", get(download_file))
        .route("/files/upload/{task_id}", post(upload_file))
        .with_state(state)
}

async fn health(State(state): State<Arc<CoordinatorState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime: state.uptime_secs(),
    })
}

async fn register_worker(
    State(state): State<Arc<CoordinatorState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<RegisterWorkerRequest>,
) -> Result<Json<RegisterWorkerResponse>, StatusCode> {
    state
        .queue
        .register_worker(&body.name, &addr.ip().to_string(), i64::from(body.cores))
        .await
        .map_err(internal_error("register_worker"))?;
    Ok(Json(RegisterWorkerResponse {
        status: "registered".to_string(),
    }))
}

async fn list_workers(
    State(state): State<Arc<CoordinatorState>>,
) -> Result<Json<Vec<WorkerView>>, StatusCode> {
    let workers = state
        .queue
        .list_workers()
        .await
        .map_err(internal_error("list_workers"))?;
    Ok(Json(workers.into_iter().map(to_worker_view).collect()))
}

async fn worker_stats(
    State(state): State<Arc<CoordinatorState>>,
    Json(body): Json<WorkerStatsRequest>,
) -> Result<Json<WorkerStatsResponse>, StatusCode> {
    state
        .queue
        .update_stats(&body.name, &body.stats)
        .await
        .map_err(internal_error("update_stats"))?;
    Ok(Json(WorkerStatsResponse {
        status: "ok".to_string(),
    }))
}

async fn pull_tasks(
    State(state): State<Arc<CoordinatorState>>,
    Json(body): Json<PullRequest>,
) -> Result<Json<Vec<LeasedTask>>, StatusCode> {
    let leased = state
        .queue
        .pull(&body.worker, body.batch_size)
        .await
        .map_err(internal_error("pull"))?;
    state
        .queue
        .heartbeat(&body.worker)
        .await
        .map_err(internal_error("heartbeat"))?;
    Ok(Json(
        leased
            .into_iter()
            .map(|task| LeasedTask {
                task_id: task.id,
                input_path: task.input_path,
                output_path: task.output_path,
            })
            .collect(),
    ))
}

async fn report_tasks(
    State(state): State<Arc<CoordinatorState>>,
    Json(body): Json<ReportRequest>,
) -> Result<Json<ReportResponse>, StatusCode> {
    let reports: Vec<hive_queue::TaskReport> = body
        .results
        .iter()
        .map(|result| hive_queue::TaskReport {
            task_id: result.task_id,
            status: result.status,
            method: result.method.clone(),
            char_count: result.char_count,
            error: result.error.clone(),
        })
        .collect();
    let count = state
        .queue
        .report(&body.worker, &reports)
        .await
        .map_err(internal_error("report"))?;
    Ok(Json(ReportResponse {
        status: "ok".to_string(),
        count,
    }))
}

async fn task_stats(
    State(state): State<Arc<CoordinatorState>>,
) -> Result<Json<TaskStatsResponse>, StatusCode> {
    let (counts, methods) = state
        .queue
        .get_stats()
        .await
        .map_err(internal_error("get_stats"))?;
    let rate = state
        .queue
        .get_rate_info()
        .await
        .map_err(internal_error("get_rate_info"))?;
    let workers = state
        .queue
        .list_workers()
        .await
        .map_err(internal_error("list_workers"))?;

    Ok(Json(TaskStatsResponse {
        counts: StatusCounts {
            total: counts.total as u64,
            pending: counts.pending as u64,
            assigned: counts.assigned as u64,
            done: counts.done as u64,
            failed: counts.failed as u64,
        },
        methods: methods
            .into_iter()
            .map(|(method, count)| (method, count as u64))
            .collect(),
        rate: hive_protocol::RateInfo {
            rate_per_sec: rate.rate_per_sec,
            eta_seconds: rate.eta_seconds,
            history: rate.history,
        },
        workers: workers.into_iter().map(to_worker_view).collect(),
    }))
}

async fn download_file(
    State(state): State<Arc<CoordinatorState>>,
    Path(task_id): Path<i64>,
) -> Result<impl IntoResponse, StatusCode> {
    let Some(input_path) = state
        .queue
        .get_task_input(task_id)
        .await
        .map_err(internal_error("get_task_input"))?
    else {
        return Err(StatusCode::NOT_FOUND);
    };
    match state.source.read(&input_path).await {
        Ok(bytes) => Ok(([("content-type", "application/pdf")], bytes)),
        Err(hive_storage::StorageError::Io(err))
            if err.kind() == std::io::ErrorKind::NotFound =>
        {
            Err(StatusCode::NOT_FOUND)
        }
        Err(hive_storage::StorageError::NotFound) => Err(StatusCode::NOT_FOUND),
        Err(err) => {
            error!(error = %err, "failed to read source file");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn upload_file(
    State(state): State<Arc<CoordinatorState>>,
    Path(task_id): Path<i64>,
    body: axum::body::Bytes,
) -> Result<Json<UploadResponse>, StatusCode> {
    let Some(output_path) = state
        .queue
        .get_task_output(task_id)
        .await
        .map_err(internal_error("get_task_output"))?
    else {
        return Err(StatusCode::NOT_FOUND);
    };
    state
        .dest
        .write(&output_path, &body)
        .await
        .map_err(internal_error("write output"))?;
    Ok(Json(UploadResponse {
        status: "ok".to_string(),
    }))
}

fn to_worker_view(row: hive_queue::WorkerRow) -> WorkerView {
    WorkerView {
        name: row.name,
        ip: row.ip,
        cores: row.cores as u32,
        last_seen: row.last_seen,
        tasks_completed: row.tasks_completed as u64,
        tasks_failed: row.tasks_failed as u64,
        telemetry: row.telemetry,
    }
}

fn internal_error<E: std::fmt::Display>(context: &'static str) -> impl Fn(E) -> StatusCode {
    move |err| {
        error!(error = %err, "{context} failed");
        StatusCode::INTERNAL_SERVER_ERROR
    }
}
