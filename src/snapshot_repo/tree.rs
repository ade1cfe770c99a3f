// Child rows of a snapshot: services, metrics, labels.
// A whole per-service subtree goes in as one transaction.

use super::SnapshotRepo;
use crate::error::{Error, Result};
use crate::models::{LabelSnapshot, MetricSnapshot, ServiceSnapshot};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

/// One scanned service with its full subtree, ready to persist.
#[derive(Debug, Clone)]
pub struct ServiceScanRecord {
    pub service_name: String,
    pub total_series: i64,
    pub metrics: Vec<MetricScanRecord>,
}

#[derive(Debug, Clone)]
pub struct MetricScanRecord {
    pub metric_name: String,
    pub series_count: i64,
    pub labels: Vec<LabelScanRecord>,
}

#[derive(Debug, Clone)]
pub struct LabelScanRecord {
    pub label_name: String,
    pub unique_values_count: i64,
    pub sample_values: Vec<String>,
}

/// Sort options for metric list reads. Unknown values fall back to the
/// default series_count descending.
#[derive(Debug, Clone, Default)]
pub struct MetricListOptions {
    pub sort: Option<String>,
    pub order: Option<String>,
}

impl MetricListOptions {
    fn order_by(&self) -> &'static str {
        let sort = match self.sort.as_deref() {
            Some("name") => "metric_name",
            _ => "series_count",
        };
        let asc = matches!(self.order.as_deref(), Some("asc"));
        match (sort, asc) {
            ("metric_name", true) => "metric_name ASC",
            ("metric_name", false) => "metric_name DESC",
            (_, true) => "series_count ASC",
            (_, false) => "series_count DESC",
        }
    }
}

impl SnapshotRepo {
    /// Inserts a service row and its metric/label children in a single
    /// transaction; a failure on any row rolls the whole service back.
    pub async fn insert_service_tree(
        &self,
        snapshot_id: i64,
        service: &ServiceScanRecord,
    ) -> Result<i64> {
        let mut tx = self.pool().begin().await?;

        let service_id = sqlx::query(
            "INSERT INTO service_snapshots (snapshot_id, service_name, total_series, metric_count) VALUES ($1, $2, $3, $4)",
        )
        .bind(snapshot_id)
        .bind(&service.service_name)
        .bind(service.total_series)
        .bind(service.metrics.len() as i64)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for metric in &service.metrics {
            let metric_id = sqlx::query(
                "INSERT INTO metric_snapshots (service_snapshot_id, metric_name, series_count, label_count) VALUES ($1, $2, $3, $4)",
            )
            .bind(service_id)
            .bind(&metric.metric_name)
            .bind(metric.series_count)
            .bind(metric.labels.len() as i64)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

            for label in &metric.labels {
                let samples = serde_json::to_string(&label.sample_values)
                    .map_err(|e| Error::Repository(format!("encode sample_values: {}", e)))?;
                sqlx::query(
                    "INSERT INTO label_snapshots (metric_snapshot_id, label_name, unique_values_count, sample_values) VALUES ($1, $2, $3, $4)",
                )
                .bind(metric_id)
                .bind(&label.label_name)
                .bind(label.unique_values_count)
                .bind(&samples)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(service_id)
    }

    pub async fn list_services(&self, snapshot_id: i64) -> Result<Vec<ServiceSnapshot>> {
        let rows = sqlx::query(
            "SELECT id, snapshot_id, service_name, total_series, metric_count FROM service_snapshots WHERE snapshot_id = $1 ORDER BY total_series DESC",
        )
        .bind(snapshot_id)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(service_from_row).collect()
    }

    pub async fn get_service_by_name(
        &self,
        snapshot_id: i64,
        name: &str,
    ) -> Result<Option<ServiceSnapshot>> {
        let row = sqlx::query(
            "SELECT id, snapshot_id, service_name, total_series, metric_count FROM service_snapshots WHERE snapshot_id = $1 AND service_name = $2",
        )
        .bind(snapshot_id)
        .bind(name)
        .fetch_optional(self.pool())
        .await?;
        row.map(|r| service_from_row(&r)).transpose()
    }

    pub async fn list_metrics(
        &self,
        service_snapshot_id: i64,
        opts: &MetricListOptions,
    ) -> Result<Vec<MetricSnapshot>> {
        let sql = format!(
            "SELECT id, service_snapshot_id, metric_name, series_count, label_count FROM metric_snapshots WHERE service_snapshot_id = $1 ORDER BY {}",
            opts.order_by()
        );
        let rows = sqlx::query(&sql)
            .bind(service_snapshot_id)
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(metric_from_row).collect()
    }

    pub async fn get_metric_by_name(
        &self,
        service_snapshot_id: i64,
        name: &str,
    ) -> Result<Option<MetricSnapshot>> {
        let row = sqlx::query(
            "SELECT id, service_snapshot_id, metric_name, series_count, label_count FROM metric_snapshots WHERE service_snapshot_id = $1 AND metric_name = $2",
        )
        .bind(service_snapshot_id)
        .bind(name)
        .fetch_optional(self.pool())
        .await?;
        row.map(|r| metric_from_row(&r)).transpose()
    }

    pub async fn list_labels(&self, metric_snapshot_id: i64) -> Result<Vec<LabelSnapshot>> {
        let rows = sqlx::query(
            "SELECT id, metric_snapshot_id, label_name, unique_values_count, sample_values FROM label_snapshots WHERE metric_snapshot_id = $1 ORDER BY unique_values_count DESC",
        )
        .bind(metric_snapshot_id)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(label_from_row).collect()
    }
}

fn service_from_row(row: &SqliteRow) -> Result<ServiceSnapshot> {
    Ok(ServiceSnapshot {
        id: row.try_get("id")?,
        snapshot_id: row.try_get("snapshot_id")?,
        service_name: row.try_get("service_name")?,
        total_series: row.try_get("total_series")?,
        metric_count: row.try_get("metric_count")?,
    })
}

fn metric_from_row(row: &SqliteRow) -> Result<MetricSnapshot> {
    Ok(MetricSnapshot {
        id: row.try_get("id")?,
        service_snapshot_id: row.try_get("service_snapshot_id")?,
        metric_name: row.try_get("metric_name")?,
        series_count: row.try_get("series_count")?,
        label_count: row.try_get("label_count")?,
    })
}

fn label_from_row(row: &SqliteRow) -> Result<LabelSnapshot> {
    let samples: String = row.try_get("sample_values")?;
    Ok(LabelSnapshot {
        id: row.try_get("id")?,
        metric_snapshot_id: row.try_get("metric_snapshot_id")?,
        label_name: row.try_get("label_name")?,
        unique_values_count: row.try_get("unique_values_count")?,
        sample_values: serde_json::from_str(&samples)
            .map_err(|e| Error::Repository(format!("decode sample_values: {}", e)))?,
    })
}
