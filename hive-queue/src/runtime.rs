use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hive_protocol::TaskStatus;
use hive_protocol::WorkerTelemetry;
use sqlx::Row;
use sqlx::Sqlite;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::sqlite::SqliteJournalMode;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::sqlite::SqliteSynchronous;

use crate::Result;
use crate::model::LeasedTask;
use crate::model::RateInfo;
use crate::model::StatusCounts;
use crate::model::TaskReport;
use crate::model::WorkerRow;
use crate::model::WorkerSqlRow;

/// How many rate samples the sweeper keeps around before pruning.
const RATE_SAMPLE_RETENTION_SECS: i64 = 1800;
/// Window used to compute the instantaneous rate in [`QueueStore::get_rate_info`].
const RATE_WINDOW_SECS: i64 = 60;
/// Upper bound on rows touched per `add_tasks` transaction.
const ADD_TASKS_BATCH_SIZE: usize = 500;

/// The durable task/worker/rate-sample store. All mutation of cluster state
/// passes through this type; it is the single source of truth for task
/// ownership.
#[derive(Clone)]
pub struct QueueStore {
    pool: Arc<SqlitePool>,
}

impl QueueStore {
    /// Open (creating if necessary) the SQLite database at `path` and run
    /// idempotent schema creation.
    pub async fn init(path: &Path) -> Result<Arc<Self>> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        create_schema(&pool).await?;
        Ok(Arc::new(Self {
            pool: Arc::new(pool),
        }))
    }

    #[cfg(test)]
    pub(crate) fn pool_for_test(&self) -> Arc<SqlitePool> {
        self.pool.clone()
    }

    /// In-memory store for tests.
    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Arc<Self>> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::new().filename(":memory:"))
            .await?;
        create_schema(&pool).await?;
        Ok(Arc::new(Self {
            pool: Arc::new(pool),
        }))
    }

    /// Bulk-insert `(input_path, output_path)` pairs, skipping duplicates on
    /// `input_path`. Returns the number of newly inserted rows.
    pub async fn add_tasks(&self, pairs: &[(String, String)]) -> Result<u64> {
        let mut inserted = 0u64;
        for chunk in pairs.chunks(ADD_TASKS_BATCH_SIZE) {
            let mut tx = self.pool.begin().await?;
            for (input_path, output_path) in chunk {
                let result = sqlx::query(
                    "INSERT OR IGNORE INTO tasks (input_path, output_path, status, char_count) \
                     VALUES (?, ?, 'pending', 0)",
                )
                .bind(input_path)
                .bind(output_path)
                .execute(&mut *tx)
                .await?;
                inserted += result.rows_affected();
            }
            tx.commit().await?;
        }
        Ok(inserted)
    }

    /// Atomically lease up to `batch_size` pending tasks to `worker`, in
    /// ascending `id` order, and mark them assigned.
    pub async fn pull(&self, worker: &str, batch_size: u32) -> Result<Vec<LeasedTask>> {
        let now = Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query(
            "SELECT id, input_path, output_path FROM tasks \
             WHERE status = 'pending' ORDER BY id ASC LIMIT ?",
        )
        .bind(i64::from(batch_size))
        .fetch_all(&mut *tx)
        .await?;

        if rows.is_empty() {
            tx.commit().await?;
            return Ok(Vec::new());
        }

        let leased: Vec<LeasedTask> = rows
            .iter()
            .map(|row| {
                Ok(LeasedTask {
                    id: row.try_get("id")?,
                    input_path: row.try_get("input_path")?,
                    output_path: row.try_get("output_path")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut builder = sqlx::QueryBuilder::<Sqlite>::new(
            "UPDATE tasks SET status = 'assigned', worker = ",
        );
        builder.push_bind(worker);
        builder.push(", assigned_at = ");
        builder.push_bind(now);
        builder.push(" WHERE id IN (");
        let mut separated = builder.separated(", ");
        for task in &leased {
            separated.push_bind(task.id);
        }
        separated.push_unseparated(")");
        builder.build().execute(&mut *tx).await?;

        sqlx::query("UPDATE workers SET last_seen = ? WHERE name = ?")
            .bind(now)
            .bind(worker)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(leased)
    }

    /// Apply a batch of worker-reported results in one transaction. A
    /// `task_id` with no matching row is silently skipped.
    pub async fn report(&self, worker: &str, results: &[TaskReport]) -> Result<usize> {
        let now = Utc::now().timestamp();
        let mut done_count: i64 = 0;
        let mut fail_count: i64 = 0;
        let mut tx = self.pool.begin().await?;
        for result in results {
            match result.status {
                TaskStatus::Done => {
                    sqlx::query(
                        "UPDATE tasks SET status = 'done', completed_at = ?, method = ?, \
                         char_count = ?, error = NULL WHERE id = ?",
                    )
                    .bind(now)
                    .bind(result.method.as_deref())
                    .bind(result.char_count)
                    .bind(result.task_id)
                    .execute(&mut *tx)
                    .await?;
                    done_count += 1;
                }
                _ => {
                    sqlx::query(
                        "UPDATE tasks SET status = 'failed', completed_at = ?, error = ?, \
                         method = ? WHERE id = ?",
                    )
                    .bind(now)
                    .bind(result.error.as_deref().unwrap_or("unknown"))
                    .bind(result.method.as_deref())
                    .bind(result.task_id)
                    .execute(&mut *tx)
                    .await?;
                    fail_count += 1;
                }
            }
        }

        sqlx::query(
            "UPDATE workers SET tasks_completed = tasks_completed + ?, \
             tasks_failed = tasks_failed + ?, last_seen = ? WHERE name = ?",
        )
        .bind(done_count)
        .bind(fail_count)
        .bind(now)
        .bind(worker)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(results.len())
    }

    /// Return over-age assigned tasks to `pending`. Returns the number of
    /// rows changed.
    pub async fn recover_stale(&self, minutes: i64) -> Result<u64> {
        let cutoff = Utc::now().timestamp() - minutes * 60;
        let result = sqlx::query(
            "UPDATE tasks SET status = 'pending', worker = NULL, assigned_at = NULL \
             WHERE status = 'assigned' AND assigned_at < ?",
        )
        .bind(cutoff)
        .execute(self.pool.as_ref())
        .await?;
        Ok(result.rows_affected())
    }

    /// Upsert a worker by name, recording its advertised IP and core count.
    pub async fn register_worker(&self, name: &str, ip: &str, cores: i64) -> Result<()> {
        let now = Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO workers (name, ip, cores, last_seen) VALUES (?, ?, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET ip = excluded.ip, cores = excluded.cores, \
             last_seen = excluded.last_seen",
        )
        .bind(name)
        .bind(ip)
        .bind(cores)
        .bind(now)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    pub async fn heartbeat(&self, name: &str) -> Result<()> {
        sqlx::query("UPDATE workers SET last_seen = ? WHERE name = ?")
            .bind(Utc::now().timestamp())
            .bind(name)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    pub async fn update_stats(&self, name: &str, stats: &WorkerTelemetry) -> Result<()> {
        sqlx::query(
            "UPDATE workers SET cpu_pct = ?, ram_used_gb = ?, ram_total_gb = ?, \
             gpu_pct = ?, gpu_temp = ?, cpu_temp = ?, last_seen = ? WHERE name = ?",
        )
        .bind(stats.cpu_pct)
        .bind(stats.ram_used_gb)
        .bind(stats.ram_total_gb)
        .bind(stats.gpu_pct)
        .bind(stats.gpu_temp)
        .bind(stats.cpu_temp)
        .bind(Utc::now().timestamp())
        .bind(name)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    pub async fn list_workers(&self) -> Result<Vec<WorkerRow>> {
        let rows = sqlx::query_as::<_, WorkerSqlRow>(
            "SELECT name, ip, cores, last_seen, tasks_completed, tasks_failed, \
             cpu_pct, ram_used_gb, ram_total_gb, gpu_pct, gpu_temp, cpu_temp \
             FROM workers ORDER BY name",
        )
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows.into_iter().map(WorkerRow::from).collect())
    }

    /// `{total, pending, assigned, done, failed}` plus a `method -> count`
    /// histogram restricted to `done` rows.
    pub async fn get_stats(&self) -> Result<(StatusCounts, BTreeMap<String, i64>)> {
        let count_rows = sqlx::query("SELECT status, COUNT(*) AS cnt FROM tasks GROUP BY status")
            .fetch_all(self.pool.as_ref())
            .await?;
        let mut counts = StatusCounts::default();
        for row in &count_rows {
            let status: String = row.try_get("status")?;
            let cnt: i64 = row.try_get("cnt")?;
            counts.total += cnt;
            match status.as_str() {
                "pending" => counts.pending = cnt,
                "assigned" => counts.assigned = cnt,
                "done" => counts.done = cnt,
                "failed" => counts.failed = cnt,
                _ => {}
            }
        }

        let method_rows = sqlx::query(
            "SELECT COALESCE(method, 'unknown') AS method, COUNT(*) AS cnt FROM tasks \
             WHERE status = 'done' GROUP BY method",
        )
        .fetch_all(self.pool.as_ref())
        .await?;
        let mut methods = BTreeMap::new();
        for row in &method_rows {
            let method: String = row.try_get("method")?;
            let cnt: i64 = row.try_get("cnt")?;
            methods.insert(method, cnt);
        }

        Ok((counts, methods))
    }

    /// Insert a `(now, done_count)` rate sample and prune samples older than
    /// 30 minutes.
    pub async fn log_rate(&self) -> Result<()> {
        let now = Utc::now().timestamp();
        let done: i64 = sqlx::query("SELECT COUNT(*) AS cnt FROM tasks WHERE status = 'done'")
            .fetch_one(self.pool.as_ref())
            .await?
            .try_get("cnt")?;
        sqlx::query(
            "INSERT OR REPLACE INTO rate_log (timestamp, completed_count) VALUES (?, ?)",
        )
        .bind(now)
        .bind(done)
        .execute(self.pool.as_ref())
        .await?;
        sqlx::query("DELETE FROM rate_log WHERE timestamp < ?")
            .bind(now - RATE_SAMPLE_RETENTION_SECS)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    /// Instantaneous rate, ETA, and per-interval rate history derived from
    /// the rate-sample table.
    pub async fn get_rate_info(&self) -> Result<RateInfo> {
        let rows = sqlx::query(
            "SELECT timestamp, completed_count FROM rate_log ORDER BY timestamp ASC",
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        let samples: Vec<(i64, i64)> = rows
            .iter()
            .map(|row| -> Result<(i64, i64)> {
                Ok((row.try_get("timestamp")?, row.try_get("completed_count")?))
            })
            .collect::<Result<Vec<_>>>()?;

        if samples.len() < 2 {
            return Ok(RateInfo::default());
        }

        let now = Utc::now().timestamp();
        let recent: Vec<(i64, i64)> = samples
            .iter()
            .copied()
            .filter(|(ts, _)| *ts > now - RATE_WINDOW_SECS)
            .collect();
        let rate = if recent.len() >= 2 {
            instantaneous_rate(recent[0], recent[recent.len() - 1])
        } else {
            instantaneous_rate(samples[samples.len() - 2], samples[samples.len() - 1])
        };

        let (counts, _) = self.get_stats().await?;
        let remaining = counts.pending + counts.assigned;
        let eta_seconds = if rate > 0.0 {
            remaining as f64 / rate
        } else {
            0.0
        };

        let history: Vec<f64> = samples
            .windows(2)
            .map(|pair| instantaneous_rate(pair[0], pair[1]))
            .collect();

        Ok(RateInfo {
            rate_per_sec: rate,
            eta_seconds,
            history,
        })
    }

    pub async fn get_task_input(&self, id: i64) -> Result<Option<String>> {
        let row = sqlx::query("SELECT input_path FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;
        row.map(|row| row.try_get("input_path")).transpose().map_err(Into::into)
    }

    pub async fn get_task_output(&self, id: i64) -> Result<Option<String>> {
        let row = sqlx::query("SELECT output_path FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;
        row.map(|row| row.try_get("output_path")).transpose().map_err(Into::into)
    }
}

fn instantaneous_rate(earlier: (i64, i64), later: (i64, i64)) -> f64 {
    let delta_time = (later.0 - earlier.0) as f64;
    let delta_count = (later.1 - earlier.1) as f64;
    if delta_time > 0.0 {
        delta_count / delta_time
    } else {
        0.0
    }
}

async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            input_path TEXT NOT NULL UNIQUE,
            output_path TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            worker TEXT,
            assigned_at INTEGER,
            completed_at INTEGER,
            method TEXT,
            char_count INTEGER NOT NULL DEFAULT 0,
            error TEXT
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS workers (
            name TEXT PRIMARY KEY,
            ip TEXT NOT NULL DEFAULT '',
            cores INTEGER NOT NULL DEFAULT 0,
            last_seen INTEGER NOT NULL DEFAULT 0,
            tasks_completed INTEGER NOT NULL DEFAULT 0,
            tasks_failed INTEGER NOT NULL DEFAULT 0,
            cpu_pct REAL,
            ram_used_gb REAL,
            ram_total_gb REAL,
            gpu_pct REAL,
            gpu_temp REAL,
            cpu_temp REAL
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS rate_log (
            timestamp INTEGER PRIMARY KEY,
            completed_count INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}
