// SnapshotRepo tests: migrations, two-phase write, tree inserts, reads,
// ordering, cascade delete, retention.

mod common;

use common::{service_record, setup_repo};
use metricscope::snapshot_repo::{
    LabelScanRecord, MetricListOptions, MetricScanRecord, ServiceScanRecord,
};

#[tokio::test]
async fn migrate_is_idempotent() {
    let (_dir, repo) = setup_repo().await;
    repo.migrate().await.unwrap();
    repo.migrate().await.unwrap();
}

#[tokio::test]
async fn snapshot_two_phase_write() {
    let (_dir, repo) = setup_repo().await;

    let id = repo.create_snapshot(1_700_000_000).await.unwrap();
    let zeroed = repo.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(zeroed.collected_at, 1_700_000_000);
    assert_eq!(zeroed.total_services, 0);
    assert_eq!(zeroed.total_series, 0);
    assert_eq!(zeroed.scan_duration_ms, 0);

    repo.finalize_snapshot(id, 3, 160, 1234).await.unwrap();
    let finalized = repo.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(finalized.total_services, 3);
    assert_eq!(finalized.total_series, 160);
    assert_eq!(finalized.scan_duration_ms, 1234);
}

#[tokio::test]
async fn collected_at_is_unique() {
    let (_dir, repo) = setup_repo().await;
    repo.create_snapshot(1_700_000_000).await.unwrap();
    assert!(repo.create_snapshot(1_700_000_000).await.is_err());
}

#[tokio::test]
async fn list_returns_newest_first_with_limit() {
    let (_dir, repo) = setup_repo().await;
    for i in 0..5 {
        repo.create_snapshot(1_700_000_000 + i).await.unwrap();
    }

    let all = repo.list(10).await.unwrap();
    assert_eq!(all.len(), 5);
    assert_eq!(all[0].collected_at, 1_700_000_004);

    let limited = repo.list(2).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].collected_at, 1_700_000_004);
    assert_eq!(limited[1].collected_at, 1_700_000_003);

    let latest = repo.get_latest().await.unwrap().unwrap();
    assert_eq!(latest.collected_at, 1_700_000_004);
}

#[tokio::test]
async fn service_tree_round_trip() {
    let (_dir, repo) = setup_repo().await;
    let snapshot_id = repo.create_snapshot(1_700_000_000).await.unwrap();

    let record = ServiceScanRecord {
        service_name: "payments".to_string(),
        total_series: 100,
        metrics: vec![
            MetricScanRecord {
                metric_name: "http_requests_total".to_string(),
                series_count: 80,
                labels: vec![
                    LabelScanRecord {
                        label_name: "path".to_string(),
                        unique_values_count: 40,
                        sample_values: vec!["/a".into(), "/b".into()],
                    },
                    LabelScanRecord {
                        label_name: "code".to_string(),
                        unique_values_count: 3,
                        sample_values: vec!["200".into(), "404".into(), "500".into()],
                    },
                ],
            },
            MetricScanRecord {
                metric_name: "up".to_string(),
                series_count: 20,
                labels: vec![],
            },
        ],
    };
    repo.insert_service_tree(snapshot_id, &record).await.unwrap();

    let service = repo
        .get_service_by_name(snapshot_id, "payments")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(service.total_series, 100);
    assert_eq!(service.metric_count, 2);

    let metrics = repo
        .list_metrics(service.id, &MetricListOptions::default())
        .await
        .unwrap();
    assert_eq!(metrics.len(), 2);
    // Default order: series_count descending.
    assert_eq!(metrics[0].metric_name, "http_requests_total");
    assert_eq!(metrics[0].label_count, 2);
    assert_eq!(metrics[1].metric_name, "up");

    let by_name_asc = repo
        .list_metrics(
            service.id,
            &MetricListOptions {
                sort: Some("name".into()),
                order: Some("asc".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(by_name_asc[0].metric_name, "http_requests_total");
    assert_eq!(by_name_asc[1].metric_name, "up");

    let metric = repo
        .get_metric_by_name(service.id, "http_requests_total")
        .await
        .unwrap()
        .unwrap();
    let labels = repo.list_labels(metric.id).await.unwrap();
    assert_eq!(labels.len(), 2);
    // Ordered by unique_values_count descending.
    assert_eq!(labels[0].label_name, "path");
    assert_eq!(labels[0].unique_values_count, 40);
    assert_eq!(labels[0].sample_values, vec!["/a", "/b"]);
    assert_eq!(labels[1].label_name, "code");
}

#[tokio::test]
async fn services_ordered_by_total_series_desc() {
    let (_dir, repo) = setup_repo().await;
    let snapshot_id = repo.create_snapshot(1_700_000_000).await.unwrap();

    for (name, series) in [("c", 10), ("a", 100), ("b", 50)] {
        repo.insert_service_tree(snapshot_id, &service_record(name, series))
            .await
            .unwrap();
    }

    let services = repo.list_services(snapshot_id).await.unwrap();
    let names: Vec<&str> = services.iter().map(|s| s.service_name.as_str()).collect();
    assert_eq!(names, ["a", "b", "c"]);
}

#[tokio::test]
async fn missing_rows_read_as_none() {
    let (_dir, repo) = setup_repo().await;
    assert!(repo.get_by_id(42).await.unwrap().is_none());
    assert!(repo.get_latest().await.unwrap().is_none());
    assert!(
        repo.get_service_by_name(42, "nope")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn delete_older_than_cascades_to_children() {
    let (_dir, repo) = setup_repo().await;
    let now = chrono::Utc::now().timestamp();
    let old_id = repo.create_snapshot(now - 10 * 24 * 3600).await.unwrap();
    let fresh_id = repo.create_snapshot(now).await.unwrap();
    repo.insert_service_tree(old_id, &service_record("payments", 100))
        .await
        .unwrap();
    repo.insert_service_tree(fresh_id, &service_record("payments", 100))
        .await
        .unwrap();

    let deleted = repo.delete_older_than(7).await.unwrap();
    assert_eq!(deleted, 1);

    assert!(repo.get_by_id(old_id).await.unwrap().is_none());
    assert!(repo.list_services(old_id).await.unwrap().is_empty());
    assert!(repo.get_by_id(fresh_id).await.unwrap().is_some());
    assert_eq!(repo.list_services(fresh_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn delete_older_than_zero_days_is_noop() {
    let (_dir, repo) = setup_repo().await;
    let now = chrono::Utc::now().timestamp();
    repo.create_snapshot(now - 100 * 24 * 3600).await.unwrap();

    let deleted = repo.delete_older_than(0).await.unwrap();
    assert_eq!(deleted, 0);
    assert_eq!(repo.list(10).await.unwrap().len(), 1);
}
