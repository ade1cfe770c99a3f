use serde::{Deserialize, Serialize};

/// Root record of one scan. Totals stay zeroed until the scan finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: i64,
    /// Unix seconds, truncated to second resolution. Unique per snapshot.
    pub collected_at: i64,
    pub total_services: i64,
    pub total_series: i64,
    pub scan_duration_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    pub id: i64,
    pub snapshot_id: i64,
    pub service_name: String,
    pub total_series: i64,
    pub metric_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub id: i64,
    pub service_snapshot_id: i64,
    pub metric_name: String,
    pub series_count: i64,
    pub label_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelSnapshot {
    pub id: i64,
    pub metric_snapshot_id: i64,
    pub label_name: String,
    pub unique_values_count: i64,
    /// Deduplicated, lexicographically sorted, capped at the configured limit.
    pub sample_values: Vec<String>,
}
