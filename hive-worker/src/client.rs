//! Thin HTTP client wrapping the coordinator's wire protocol.

use hive_protocol::LeasedTask;
use hive_protocol::PullRequest;
use hive_protocol::RegisterWorkerRequest;
use hive_protocol::ReportRequest;
use hive_protocol::TaskResult;
use hive_protocol::WorkerStatsRequest;
use hive_protocol::WorkerTelemetry;

/// A `reqwest`-backed client for the coordinator's worker-facing endpoints.
/// Cloning is cheap; `reqwest::Client` holds a connection pool behind an
/// `Arc` internally.
#[derive(Clone)]
pub struct CoordinatorClient {
    base_url: String,
    http: reqwest::Client,
}

impl CoordinatorClient {
    /// Normalize `coordinator` (which may be a bare `host:port` or a full
    /// URL) into a base URL with no trailing slash.
    pub fn new(coordinator: &str) -> Self {
        let base_url = if coordinator.starts_with("http://") || coordinator.starts_with("https://")
        {
            coordinator.to_string()
        } else {
            format!("http://{coordinator}")
        };
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub async fn register(&self, name: &str, cores: u32) -> reqwest::Result<reqwest::Response> {
        self.http
            .post(format!("{}/workers/register", self.base_url))
            .json(&RegisterWorkerRequest {
                name: name.to_string(),
                cores,
            })
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
    }

    pub async fn pull(&self, worker: &str, batch_size: u32) -> reqwest::Result<Vec<LeasedTask>> {
        self.http
            .post(format!("{}/tasks/pull", self.base_url))
            .json(&PullRequest {
                worker: worker.to_string(),
                batch_size,
            })
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await?
            .json()
            .await
    }

    pub async fn report(&self, worker: &str, results: Vec<TaskResult>) -> reqwest::Result<()> {
        self.http
            .post(format!("{}/tasks/report", self.base_url))
            .json(&ReportRequest {
                worker: worker.to_string(),
                results,
            })
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn push_stats(&self, name: &str, stats: WorkerTelemetry) -> reqwest::Result<()> {
        self.http
            .post(format!("{}/workers/stats", self.base_url))
            .json(&WorkerStatsRequest {
                name: name.to_string(),
                stats,
            })
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Download the input bytes for `task_id` via the file proxy.
    pub async fn download_input(&self, task_id: i64) -> reqwest::Result<reqwest::Response> {
        self.http
            .get(format!("{}/files/{task_id}", self.base_url))
            .timeout(crate::DOWNLOAD_TIMEOUT)
            .send()
            .await
    }

    /// Upload extracted output bytes for `task_id` via the file proxy.
    pub async fn upload_output(
        &self,
        task_id: i64,
        bytes: Vec<u8>,
    ) -> reqwest::Result<reqwest::Response> {
        self.http
            .post(format!("{}/files/upload/{task_id}", self.base_url))
            .body(bytes)
            .timeout(crate::DOWNLOAD_TIMEOUT)
            .send()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_port_gets_http_scheme() {
        let client = CoordinatorClient::new("localhost:9000");
        assert_eq!(client.base_url, "http://localhost:9000");
    }

    #[test]
    fn explicit_scheme_and_trailing_slash_are_preserved_and_trimmed() {
        let client = CoordinatorClient::new("https://coordinator.internal/");
        assert_eq!(client.base_url, "https://coordinator.internal");
    }
}
