// SQLite snapshot store. Snapshot rows are written in two phases: a zeroed
// root at scan start, totals filled in once every child row exists.

mod tree;

pub use tree::{LabelScanRecord, MetricListOptions, MetricScanRecord, ServiceScanRecord};

use crate::error::{Error, Result};
use crate::models::Snapshot;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::path::Path;
use std::str::FromStr;
use tracing::{info, instrument};

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001_snapshot_tree",
        r#"
        CREATE TABLE IF NOT EXISTS snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            collected_at INTEGER NOT NULL UNIQUE,
            total_services INTEGER NOT NULL DEFAULT 0,
            total_series INTEGER NOT NULL DEFAULT 0,
            scan_duration_ms INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS service_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            snapshot_id INTEGER NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE,
            service_name TEXT NOT NULL,
            total_series INTEGER NOT NULL DEFAULT 0,
            metric_count INTEGER NOT NULL DEFAULT 0,
            UNIQUE (snapshot_id, service_name)
        );
        CREATE INDEX IF NOT EXISTS idx_service_snapshots_snapshot
            ON service_snapshots(snapshot_id);

        CREATE TABLE IF NOT EXISTS metric_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            service_snapshot_id INTEGER NOT NULL REFERENCES service_snapshots(id) ON DELETE CASCADE,
            metric_name TEXT NOT NULL,
            series_count INTEGER NOT NULL DEFAULT 0,
            label_count INTEGER NOT NULL DEFAULT 0,
            UNIQUE (service_snapshot_id, metric_name)
        );
        CREATE INDEX IF NOT EXISTS idx_metric_snapshots_service
            ON metric_snapshots(service_snapshot_id);

        CREATE TABLE IF NOT EXISTS label_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            metric_snapshot_id INTEGER NOT NULL REFERENCES metric_snapshots(id) ON DELETE CASCADE,
            label_name TEXT NOT NULL,
            unique_values_count INTEGER NOT NULL DEFAULT 0,
            sample_values TEXT NOT NULL DEFAULT '[]'
        );
        CREATE INDEX IF NOT EXISTS idx_label_snapshots_metric
            ON label_snapshots(metric_snapshot_id);
        "#,
    ),
    (
        "0002_snapshot_analyses",
        r#"
        CREATE TABLE IF NOT EXISTS snapshot_analyses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            current_snapshot_id INTEGER NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE,
            previous_snapshot_id INTEGER NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'pending',
            result TEXT,
            error TEXT,
            tool_calls TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            completed_at INTEGER,
            UNIQUE (current_snapshot_id, previous_snapshot_id)
        );
        CREATE INDEX IF NOT EXISTS idx_snapshot_analyses_current
            ON snapshot_analyses(current_snapshot_id);
        CREATE INDEX IF NOT EXISTS idx_snapshot_analyses_previous
            ON snapshot_analyses(previous_snapshot_id);
        "#,
    ),
];

pub struct SnapshotRepo {
    pool: SqlitePool,
}

impl SnapshotRepo {
    pub async fn connect(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Repository(format!("create storage dir: {}", e)))?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))
            .map_err(|e| Error::Repository(format!("storage path: {}", e)))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        Ok(Self { pool })
    }

    /// Applies embedded migrations in lexicographic version order, each in
    /// its own transaction. Already-applied versions are skipped.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (version TEXT PRIMARY KEY, applied_at INTEGER NOT NULL)",
        )
        .execute(&self.pool)
        .await?;

        for &(version, sql) in MIGRATIONS {
            let applied = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = $1")
                .bind(version)
                .fetch_optional(&self.pool)
                .await?
                .is_some();
            if applied {
                continue;
            }

            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(sql).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES ($1, $2)")
                .bind(version)
                .bind(chrono::Utc::now().timestamp())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            info!(version, "applied migration");
        }
        Ok(())
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Handle for stores sharing this database (e.g. the analysis repo).
    pub fn pool_clone(&self) -> SqlitePool {
        self.pool.clone()
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Phase one: insert the root with zeroed totals so children can
    /// reference it. `collected_at` must be second-truncated and unique.
    pub async fn create_snapshot(&self, collected_at: i64) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO snapshots (collected_at, total_services, total_series, scan_duration_ms) VALUES ($1, 0, 0, 0)",
        )
        .bind(collected_at)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Phase two: make the final totals visible after all children exist.
    pub async fn finalize_snapshot(
        &self,
        id: i64,
        total_services: i64,
        total_series: i64,
        scan_duration_ms: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE snapshots SET total_services = $1, total_series = $2, scan_duration_ms = $3 WHERE id = $4",
        )
        .bind(total_services)
        .bind(total_series)
        .bind(scan_duration_ms)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Snapshot>> {
        let row = sqlx::query(
            "SELECT id, collected_at, total_services, total_series, scan_duration_ms FROM snapshots WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| snapshot_from_row(&r)).transpose()
    }

    pub async fn get_latest(&self) -> Result<Option<Snapshot>> {
        let row = sqlx::query(
            "SELECT id, collected_at, total_services, total_series, scan_duration_ms FROM snapshots ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| snapshot_from_row(&r)).transpose()
    }

    pub async fn list(&self, limit: u32) -> Result<Vec<Snapshot>> {
        let rows = sqlx::query(
            "SELECT id, collected_at, total_services, total_series, scan_duration_ms FROM snapshots ORDER BY id DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(snapshot_from_row).collect()
    }

    /// Deletes snapshots whose collected_at is older than `days` days,
    /// cascading through the tree. Returns the number of roots removed.
    /// `days == 0` means retention is disabled and nothing is deleted.
    #[instrument(skip(self), fields(repo = "snapshots", operation = "delete_older_than"))]
    pub async fn delete_older_than(&self, days: u32) -> Result<u64> {
        if days == 0 {
            return Ok(0);
        }
        let cutoff = chrono::Utc::now().timestamp() - (days as i64) * 24 * 60 * 60;
        let result = sqlx::query("DELETE FROM snapshots WHERE collected_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn snapshot_from_row(row: &SqliteRow) -> Result<Snapshot> {
    Ok(Snapshot {
        id: row.try_get("id")?,
        collected_at: row.try_get("collected_at")?,
        total_services: row.try_get("total_services")?,
        total_series: row.try_get("total_series")?,
        scan_duration_ms: row.try_get("scan_duration_ms")?,
    })
}
