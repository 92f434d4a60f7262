//! End-to-end exercise of the coordinator's HTTP surface over a real bound
//! socket, using an in-memory queue and a local-filesystem storage pair.

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use hive_coordinator::CoordinatorState;
use hive_protocol::PullRequest;
use hive_protocol::RegisterWorkerRequest;
use hive_protocol::ReportRequest;
use hive_protocol::TaskResult;
use hive_protocol::TaskStatus;
use hive_queue::QueueStore;
use hive_storage::LocalStorage;

async fn spawn_test_server(source_dir: &std::path::Path, dest_dir: &std::path::Path) -> String {
    let queue = QueueStore::open_in_memory().await.unwrap();
    queue
        .add_tasks(&[(
            source_dir.join("a.pdf").to_string_lossy().into_owned(),
            dest_dir.join("a.txt").to_string_lossy().into_owned(),
        )])
        .await
        .unwrap();

    let state = Arc::new(CoordinatorState {
        queue,
        source: Arc::new(LocalStorage::new(source_dir.to_path_buf())),
        dest: Arc::new(LocalStorage::new(dest_dir.to_path_buf())),
        started_at: Instant::now(),
    });
    let app = hive_coordinator::test_support::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn full_pull_report_stats_cycle() {
    let source_dir = tempfile::tempdir().unwrap();
    let dest_dir = tempfile::tempdir().unwrap();
    tokio::fs::write(source_dir.path().join("a.pdf"), b"%PDF-1.4 fake")
        .await
        .unwrap();
    let base = spawn_test_server(source_dir.path(), dest_dir.path()).await;
    let client = reqwest::Client::new();

    let health: hive_protocol::HealthResponse = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.status, "ok");

    let register: hive_protocol::RegisterWorkerResponse = client
        .post(format!("{base}/workers/register"))
        .json(&RegisterWorkerRequest {
            name: "w1".to_string(),
            cores: 4,
        })
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(register.status, "registered");

    let leased: Vec<hive_protocol::LeasedTask> = client
        .post(format!("{base}/tasks/pull"))
        .json(&PullRequest {
            worker: "w1".to_string(),
            batch_size: 10,
        })
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(leased.len(), 1);
    let task_id = leased[0].task_id;

    let pdf_bytes = client
        .get(format!("{base}/files/{task_id}"))
        .send()
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(&pdf_bytes[..], b"%PDF-1.4 fake");

    let upload_status = client
        .post(format!("{base}/files/upload/{task_id}"))
        .body("extracted text")
        .send()
        .await
        .unwrap();
    assert!(upload_status.status().is_success());
    assert_eq!(
        tokio::fs::read_to_string(dest_dir.path().join("a.txt"))
            .await
            .unwrap(),
        "extracted text"
    );

    let report: hive_protocol::ReportResponse = client
        .post(format!("{base}/tasks/report"))
        .json(&ReportRequest {
            worker: "w1".to_string(),
            results: vec![TaskResult {
                task_id,
                status: TaskStatus::Done,
                method: Some("plaintext".to_string()),
                char_count: 14,
                error: None,
            }],
        })
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report.count, 1);

    let stats: hive_protocol::TaskStatsResponse = client
        .get(format!("{base}/tasks/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats.counts.total, 1);
    assert_eq!(stats.counts.done, 1);
    assert_eq!(stats.workers.len(), 1);
}

#[tokio::test]
async fn files_endpoint_404s_for_unknown_task() {
    let source_dir = tempfile::tempdir().unwrap();
    let dest_dir = tempfile::tempdir().unwrap();
    let base = spawn_test_server(source_dir.path(), dest_dir.path()).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{base}/files/999999"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}
