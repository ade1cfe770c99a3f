// Shared test helpers: temp databases and canned Prometheus responses.
#![allow(dead_code)]

use metricscope::snapshot_repo::{
    LabelScanRecord, MetricScanRecord, ServiceScanRecord, SnapshotRepo,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;

/// Fresh migrated store in a temp dir. Keep the TempDir alive for the test.
pub async fn setup_repo() -> (TempDir, Arc<SnapshotRepo>) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("metricscope.db");
    let repo = SnapshotRepo::connect(path.to_str().unwrap()).await.unwrap();
    repo.migrate().await.unwrap();
    (dir, Arc::new(repo))
}

/// Prometheus success envelope around arbitrary data.
pub fn envelope(data: Value) -> Value {
    json!({"status": "success", "data": data})
}

/// Instant-query vector result from (labelset, value) pairs.
pub fn vector(samples: &[(Value, &str)]) -> Value {
    let result: Vec<Value> = samples
        .iter()
        .map(|(metric, value)| json!({"metric": metric, "value": [1712000000.0, value]}))
        .collect();
    json!({"resultType": "vector", "result": result})
}

pub fn service_record(name: &str, total_series: i64) -> ServiceScanRecord {
    ServiceScanRecord {
        service_name: name.to_string(),
        total_series,
        metrics: vec![
            MetricScanRecord {
                metric_name: "http_requests_total".to_string(),
                series_count: total_series / 2,
                labels: vec![LabelScanRecord {
                    label_name: "code".to_string(),
                    unique_values_count: 3,
                    sample_values: vec!["200".into(), "404".into(), "500".into()],
                }],
            },
            MetricScanRecord {
                metric_name: "process_cpu_seconds_total".to_string(),
                series_count: total_series - total_series / 2,
                labels: vec![],
            },
        ],
    }
}
