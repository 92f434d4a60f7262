//! The coordinator: scans for PDFs once at startup, seeds the durable queue,
//! serves the worker-facing HTTP API, and runs the stale-lease and rate
//! background loops for as long as the process lives.

mod background;
mod routes;
mod scan;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use hive_queue::QueueStore;
use hive_storage::Location;
use tracing::info;

pub use state::CoordinatorState;

/// Exposed only so the integration tests in `tests/` can stand up the router
/// directly against a hand-built [`CoordinatorState`], without going through
/// [`run`]'s scan-and-seed startup sequence.
pub mod test_support {
    pub use crate::routes::router;
}

pub struct CoordinatorConfig {
    pub port: u16,
    pub db_path: std::path::PathBuf,
    pub pdf_source: String,
    pub text_dest: String,
    pub stale_minutes: i64,
}

/// Initialize the queue, scan and seed it, then serve the HTTP API and
/// housekeeping loops until `shutdown` resolves.
pub async fn run(
    config: CoordinatorConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let source_location = Location::parse(&config.pdf_source);
    let dest_location = Location::parse(&config.text_dest);
    info!(source = ?source_location, dest = ?dest_location, "parsed storage locations");

    let source: Arc<dyn hive_storage::Storage> = Arc::from(hive_storage::open(&source_location));
    let dest: Arc<dyn hive_storage::Storage> = Arc::from(hive_storage::open(&dest_location));
    let dest_is_remote = matches!(dest_location, Location::Remote { .. });

    let queue = QueueStore::init(&config.db_path).await?;

    let pairs = scan::scan_and_seed(
        source.as_ref(),
        source_location.path(),
        dest.as_ref(),
        dest_location.path(),
        dest_is_remote,
    )
    .await?;
    if !pairs.is_empty() {
        let added = queue.add_tasks(&pairs).await?;
        info!(added, scanned = pairs.len(), "seeded queue with new tasks");
    }

    let (counts, _) = queue.get_stats().await?;
    info!(
        total = counts.total,
        pending = counts.pending,
        done = counts.done,
        "queue ready"
    );

    let stale_sweeper = background::spawn_stale_sweeper(queue.clone(), config.stale_minutes);
    let rate_snapshotter = background::spawn_rate_snapshotter(queue.clone());

    let state = Arc::new(CoordinatorState {
        queue,
        source,
        dest,
        started_at: Instant::now(),
    });
    let app = routes::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(port = config.port, "coordinator listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    stale_sweeper.abort();
    rate_snapshotter.abort();
    Ok(())
}
