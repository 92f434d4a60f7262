use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use clap::Subcommand;
use hive_coordinator::CoordinatorConfig;
use hive_worker::WorkerConfig;
use tracing_subscriber::EnvFilter;

/// `hive`: coordinator, worker, and status subcommands for the PDF-to-text
/// extraction cluster.
#[derive(Debug, Parser)]
#[clap(name = "hive", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan the source tree, seed the queue, and serve the worker-facing API.
    Coordinator(CoordinatorArgs),
    /// Lease batches from a coordinator and run extraction.
    Worker(WorkerArgs),
    /// Print cluster status.
    Status(StatusArgs),
}

#[derive(Debug, clap::Args)]
struct CoordinatorArgs {
    #[arg(long, default_value_t = 9000)]
    port: u16,

    #[arg(long = "pdf-source")]
    pdf_source: String,

    #[arg(long = "text-dest")]
    text_dest: String,

    #[arg(long = "stale-minutes", default_value_t = 10)]
    stale_minutes: i64,

    /// Path to the coordinator's embedded SQLite database file.
    #[arg(long = "db-path", default_value = "hive.db")]
    db_path: PathBuf,
}

#[derive(Debug, clap::Args)]
struct WorkerArgs {
    #[arg(long)]
    coordinator: String,

    /// Parallel extraction units. 0 resolves to the available parallelism.
    #[arg(long, default_value_t = 0)]
    cpus: u32,

    #[arg(long = "batch-size", default_value_t = 50)]
    batch_size: u32,

    #[arg(long = "local-pdf-dir")]
    local_pdf_dir: Option<String>,

    #[arg(long = "local-text-dir")]
    local_text_dir: Option<String>,

    #[arg(long)]
    name: Option<String>,
}

#[derive(Debug, clap::Args)]
struct StatusArgs {
    #[arg(long)]
    coordinator: String,

    /// Re-print the summary every 2 seconds instead of exiting after one.
    #[arg(long)]
    watch: bool,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Coordinator(args) => run_coordinator(args).await,
        Command::Worker(args) => run_worker(args).await,
        Command::Status(args) => run_status(args).await,
    }
}

async fn run_coordinator(args: CoordinatorArgs) -> anyhow::Result<()> {
    let config = CoordinatorConfig {
        port: args.port,
        db_path: args.db_path,
        pdf_source: args.pdf_source,
        text_dest: args.text_dest,
        stale_minutes: args.stale_minutes,
    };
    hive_coordinator::run(config, ctrl_c_only()).await
}

async fn run_worker(args: WorkerArgs) -> anyhow::Result<()> {
    let name = args
        .name
        .unwrap_or_else(|| format!("worker-{}", std::process::id()));
    let config = WorkerConfig {
        coordinator: args.coordinator,
        cpus: args.cpus,
        batch_size: args.batch_size,
        local_input_dir: args.local_pdf_dir,
        local_output_dir: args.local_text_dir,
        name,
    };
    hive_worker::run(config, shutdown_signal()).await
}

async fn run_status(args: StatusArgs) -> anyhow::Result<()> {
    let base_url = if args.coordinator.starts_with("http") {
        args.coordinator.clone()
    } else {
        format!("http://{}", args.coordinator)
    };
    let client = reqwest::Client::new();

    if !args.watch {
        match fetch_and_print(&client, &base_url).await {
            Ok(()) => Ok(()),
            Err(err) => {
                eprintln!("hive status: {err}");
                std::process::exit(1);
            }
        }
    } else {
        loop {
            if let Err(err) = fetch_and_print(&client, &base_url).await {
                eprintln!("hive status: {err}");
            }
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    }
}

async fn fetch_and_print(client: &reqwest::Client, base_url: &str) -> anyhow::Result<()> {
    let stats: hive_protocol::TaskStatsResponse = client
        .get(format!("{base_url}/tasks/stats"))
        .timeout(Duration::from_secs(10))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    println!(
        "total={} pending={} assigned={} done={} failed={} rate={:.2}/s eta={:.0}s workers={}",
        stats.counts.total,
        stats.counts.pending,
        stats.counts.assigned,
        stats.counts.done,
        stats.counts.failed,
        stats.rate.rate_per_sec,
        stats.rate.eta_seconds,
        stats.workers.len(),
    );
    for (method, count) in &stats.methods {
        println!("  method {method}: {count}");
    }
    for worker in &stats.workers {
        println!(
            "  worker {} ({}): completed={} failed={}",
            worker.name, worker.ip, worker.tasks_completed, worker.tasks_failed
        );
    }
    Ok(())
}

/// The coordinator has no explicit shutdown protocol (SPEC_FULL.md §5); a
/// plain ctrl-c triggers axum's graceful shutdown, which finishes in-flight
/// requests before the process exits.
async fn ctrl_c_only() {
    let _ = tokio::signal::ctrl_c().await;
}

/// The worker's shutdown is cooperative and must react to either SIGINT or
/// SIGTERM (SPEC_FULL.md §4.5): the in-flight batch is allowed to finish,
/// only the next pull is skipped.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut terminate = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            Ok(signal) => signal,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn coordinator_subcommand_parses_required_flags() {
        let cli = Cli::try_parse_from([
            "hive",
            "coordinator",
            "--pdf-source",
            "/src/pdfs",
            "--text-dest",
            "/out/text",
        ])
        .expect("parse should succeed");
        let Command::Coordinator(args) = cli.command else {
            panic!("expected coordinator subcommand");
        };
        assert_eq!(args.port, 9000);
        assert_eq!(args.pdf_source, "/src/pdfs");
        assert_eq!(args.text_dest, "/out/text");
        assert_eq!(args.stale_minutes, 10);
    }

    #[test]
    fn worker_subcommand_defaults_cpus_to_zero_and_name_to_none() {
        let cli = Cli::try_parse_from(["hive", "worker", "--coordinator", "localhost:9000"])
            .expect("parse should succeed");
        let Command::Worker(args) = cli.command else {
            panic!("expected worker subcommand");
        };
        assert_eq!(args.cpus, 0);
        assert_eq!(args.batch_size, 50);
        assert_eq!(args.name, None);
        assert_eq!(args.local_pdf_dir, None);
    }

    #[test]
    fn worker_subcommand_accepts_local_dirs_and_name() {
        let cli = Cli::try_parse_from([
            "hive",
            "worker",
            "--coordinator",
            "localhost:9000",
            "--local-pdf-dir",
            "/pdfs",
            "--local-text-dir",
            "/text",
            "--name",
            "gpu-0",
            "--cpus",
            "8",
        ])
        .expect("parse should succeed");
        let Command::Worker(args) = cli.command else {
            panic!("expected worker subcommand");
        };
        assert_eq!(args.local_pdf_dir.as_deref(), Some("/pdfs"));
        assert_eq!(args.local_text_dir.as_deref(), Some("/text"));
        assert_eq!(args.name.as_deref(), Some("gpu-0"));
        assert_eq!(args.cpus, 8);
    }

    #[test]
    fn status_subcommand_requires_coordinator() {
        let result = Cli::try_parse_from(["hive", "status"]);
        assert_matches!(result, Err(_));
    }

    #[test]
    fn status_subcommand_parses_watch_flag() {
        let cli = Cli::try_parse_from(["hive", "status", "--coordinator", "localhost:9000", "--watch"])
            .expect("parse should succeed");
        let Command::Status(args) = cli.command else {
            panic!("expected status subcommand");
        };
        assert!(args.watch);
    }
}
