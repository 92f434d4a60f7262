use hive_protocol::TaskStatus;
use hive_protocol::WorkerTelemetry;

/// A leased triple returned by [`crate::QueueStore::pull`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeasedTask {
    pub id: i64,
    pub input_path: String,
    pub output_path: String,
}

/// One task's terminal or in-flight report, as accepted by
/// [`crate::QueueStore::report`].
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task_id: i64,
    pub status: TaskStatus,
    pub method: Option<String>,
    pub char_count: i64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerRow {
    pub name: String,
    pub ip: String,
    pub cores: i64,
    pub last_seen: i64,
    pub tasks_completed: i64,
    pub tasks_failed: i64,
    pub telemetry: WorkerTelemetry,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct WorkerSqlRow {
    pub(crate) name: String,
    pub(crate) ip: String,
    pub(crate) cores: i64,
    pub(crate) last_seen: i64,
    pub(crate) tasks_completed: i64,
    pub(crate) tasks_failed: i64,
    pub(crate) cpu_pct: Option<f64>,
    pub(crate) ram_used_gb: Option<f64>,
    pub(crate) ram_total_gb: Option<f64>,
    pub(crate) gpu_pct: Option<f64>,
    pub(crate) gpu_temp: Option<f64>,
    pub(crate) cpu_temp: Option<f64>,
}

impl From<WorkerSqlRow> for WorkerRow {
    fn from(row: WorkerSqlRow) -> Self {
        Self {
            name: row.name,
            ip: row.ip,
            cores: row.cores,
            last_seen: row.last_seen,
            tasks_completed: row.tasks_completed,
            tasks_failed: row.tasks_failed,
            telemetry: WorkerTelemetry {
                cpu_pct: row.cpu_pct,
                ram_used_gb: row.ram_used_gb,
                ram_total_gb: row.ram_total_gb,
                gpu_pct: row.gpu_pct,
                gpu_temp: row.gpu_temp,
                cpu_temp: row.cpu_temp,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusCounts {
    pub total: i64,
    pub pending: i64,
    pub assigned: i64,
    pub done: i64,
    pub failed: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateInfo {
    pub rate_per_sec: f64,
    pub eta_seconds: f64,
    pub history: Vec<f64>,
}
