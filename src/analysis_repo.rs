// SQLite store for snapshot analyses. One row per (current, previous) pair;
// tool calls persist as a JSON array in invocation order.

use crate::error::{Error, Result};
use crate::models::{AnalysisStatus, SnapshotAnalysis, ToolCall};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};

const COLUMNS: &str = "id, current_snapshot_id, previous_snapshot_id, status, result, error, tool_calls, created_at, completed_at";

pub struct AnalysisRepo {
    pool: SqlitePool,
}

impl AnalysisRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a pending analysis. Fails on an existing row for the pair.
    pub async fn create(&self, current_id: i64, previous_id: i64) -> Result<SnapshotAnalysis> {
        let created_at = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            "INSERT INTO snapshot_analyses (current_snapshot_id, previous_snapshot_id, status, tool_calls, created_at) VALUES ($1, $2, $3, '[]', $4)",
        )
        .bind(current_id)
        .bind(previous_id)
        .bind(AnalysisStatus::Pending.as_str())
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(SnapshotAnalysis {
            id: result.last_insert_rowid(),
            current_snapshot_id: current_id,
            previous_snapshot_id: previous_id,
            status: AnalysisStatus::Pending,
            result: None,
            error: None,
            tool_calls: Vec::new(),
            created_at,
            completed_at: None,
        })
    }

    pub async fn get_by_pair(
        &self,
        current_id: i64,
        previous_id: i64,
    ) -> Result<Option<SnapshotAnalysis>> {
        let sql = format!(
            "SELECT {} FROM snapshot_analyses WHERE current_snapshot_id = $1 AND previous_snapshot_id = $2",
            COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(current_id)
            .bind(previous_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| analysis_from_row(&r)).transpose()
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<SnapshotAnalysis>> {
        let sql = format!("SELECT {} FROM snapshot_analyses WHERE id = $1", COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| analysis_from_row(&r)).transpose()
    }

    /// Analyses referencing the snapshot on either side, newest first.
    pub async fn list_by_snapshot(&self, snapshot_id: i64) -> Result<Vec<SnapshotAnalysis>> {
        let sql = format!(
            "SELECT {} FROM snapshot_analyses WHERE current_snapshot_id = $1 OR previous_snapshot_id = $1 ORDER BY id DESC",
            COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(snapshot_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(analysis_from_row).collect()
    }

    /// Writes the mutable fields back; id, pair and created_at never change.
    pub async fn update(&self, analysis: &SnapshotAnalysis) -> Result<()> {
        let tool_calls = serde_json::to_string(&analysis.tool_calls)
            .map_err(|e| Error::Repository(format!("encode tool_calls: {}", e)))?;
        sqlx::query(
            "UPDATE snapshot_analyses SET status = $1, result = $2, error = $3, tool_calls = $4, completed_at = $5 WHERE id = $6",
        )
        .bind(analysis.status.as_str())
        .bind(&analysis.result)
        .bind(&analysis.error)
        .bind(&tool_calls)
        .bind(analysis.completed_at)
        .bind(analysis.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Idempotent: deleting a missing pair is not an error.
    pub async fn delete(&self, current_id: i64, previous_id: i64) -> Result<()> {
        sqlx::query(
            "DELETE FROM snapshot_analyses WHERE current_snapshot_id = $1 AND previous_snapshot_id = $2",
        )
        .bind(current_id)
        .bind(previous_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn analysis_from_row(row: &SqliteRow) -> Result<SnapshotAnalysis> {
    let status_str: String = row.try_get("status")?;
    let status = AnalysisStatus::parse(&status_str)
        .ok_or_else(|| Error::Repository(format!("unknown analysis status: {}", status_str)))?;
    let tool_calls_json: String = row.try_get("tool_calls")?;
    let tool_calls: Vec<ToolCall> = serde_json::from_str(&tool_calls_json)
        .map_err(|e| Error::Repository(format!("decode tool_calls: {}", e)))?;

    Ok(SnapshotAnalysis {
        id: row.try_get("id")?,
        current_snapshot_id: row.try_get("current_snapshot_id")?,
        previous_snapshot_id: row.try_get("previous_snapshot_id")?,
        status,
        result: row.try_get("result")?,
        error: row.try_get("error")?,
        tool_calls,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}
