//! Wire types shared by the coordinator, the worker, and the CLI.
//!
//! Every request/response body the HTTP surface exchanges lives here so that
//! the three binaries agree on field names without duplicating `serde`
//! derives.

use serde::Deserialize;
use serde::Serialize;

/// A task's lifecycle state, as observed over the wire.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Assigned,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Assigned => "assigned",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "assigned" => Ok(TaskStatus::Assigned),
            "done" => Ok(TaskStatus::Done),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status `{other}`")),
        }
    }
}

/// Best-effort worker telemetry. Every field is optional because real
/// hardware probing is out of scope; workers populate what they can.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkerTelemetry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ram_used_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ram_total_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_temp: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub uptime: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RegisterWorkerRequest {
    pub name: String,
    pub cores: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RegisterWorkerResponse {
    pub status: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkerView {
    pub name: String,
    pub ip: String,
    pub cores: u32,
    pub last_seen: i64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    #[serde(flatten)]
    pub telemetry: WorkerTelemetry,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkerStatsRequest {
    pub name: String,
    pub stats: WorkerTelemetry,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkerStatsResponse {
    pub status: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PullRequest {
    pub worker: String,
    pub batch_size: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LeasedTask {
    pub task_id: i64,
    pub input_path: String,
    pub output_path: String,
}

/// One task's outcome, as reported by a worker after attempting extraction.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TaskResult {
    pub task_id: i64,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default)]
    pub char_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReportRequest {
    pub worker: String,
    pub results: Vec<TaskResult>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReportResponse {
    pub status: String,
    pub count: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct StatusCounts {
    pub total: u64,
    pub pending: u64,
    pub assigned: u64,
    pub done: u64,
    pub failed: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RateInfo {
    pub rate_per_sec: f64,
    pub eta_seconds: f64,
    pub history: Vec<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TaskStatsResponse {
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub methods: std::collections::BTreeMap<String, u64>,
    #[serde(flatten)]
    pub rate: RateInfo,
    pub workers: Vec<WorkerView>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UploadResponse {
    pub status: String,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn task_status_round_trips_through_json() {
        let json = serde_json::to_string(&TaskStatus::Assigned).unwrap();
        assert_eq!(json, "\"assigned\"");
        let back: TaskStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TaskStatus::Assigned);
    }

    #[test]
    fn task_status_parses_from_str() {
        assert_eq!("done".parse::<TaskStatus>().unwrap(), TaskStatus::Done);
        assert!("bogus".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn task_result_omits_absent_error_and_method() {
        let result = TaskResult {
            task_id: 1,
            status: TaskStatus::Done,
            method: Some("pdftotext".to_string()),
            char_count: 42,
            error: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json.get("method").unwrap(), "pdftotext");
    }

    #[test]
    fn task_stats_response_flattens_counts_and_rate() {
        let response = TaskStatsResponse {
            counts: StatusCounts {
                total: 2,
                pending: 0,
                assigned: 0,
                done: 2,
                failed: 0,
            },
            methods: std::collections::BTreeMap::from([("pdftotext".to_string(), 2)]),
            rate: RateInfo {
                rate_per_sec: 0.75,
                eta_seconds: 40.0,
                history: vec![0.5, 1.0],
            },
            workers: Vec::new(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["total"], 2);
        assert_eq!(json["rate_per_sec"], 0.75);
    }
}
