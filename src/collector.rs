// One scan = one snapshot tree. Services scan concurrently under a bounded
// semaphore; per-service failures are logged and skipped, label failures
// degrade to an empty label set. Totals go to the root only at the end.

use crate::error::{Error, Result};
use crate::prom_client::{PromClient, ServiceInfo};
use crate::snapshot_repo::{
    LabelScanRecord, MetricScanRecord, ServiceScanRecord, SnapshotRepo,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Semaphore, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Upper bound on one service's scan so a pathological service cannot hold
/// a pool slot indefinitely.
const SERVICE_SCAN_TIMEOUT: Duration = Duration::from_secs(120);

/// Receives scan progress events. Implementations must not block; the
/// collector calls this outside of its aggregation lock.
pub trait ProgressSink: Send + Sync {
    fn progress(&self, phase: &str, current: usize, total: usize, detail: &str);
}

/// Progress sink that logs at INFO level.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn progress(&self, phase: &str, current: usize, total: usize, detail: &str) {
        info!(phase, current, total, detail, "scan progress");
    }
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub service_label: String,
    pub sample_values_limit: usize,
    /// Width of the per-service work pool. 1 is serial.
    pub concurrency: usize,
    /// Metrics above this series count skip the label fetch. 0 disables.
    pub label_fetch_threshold: i64,
}

#[derive(Debug, Clone)]
pub struct CollectResult {
    pub snapshot_id: i64,
    pub total_services: i64,
    pub total_series: i64,
    pub duration: Duration,
}

#[derive(Default)]
struct ScanTotals {
    services: i64,
    series: i64,
}

pub struct Collector {
    client: Arc<PromClient>,
    snapshots: Arc<SnapshotRepo>,
    config: CollectorConfig,
}

impl Collector {
    pub fn new(
        client: Arc<PromClient>,
        snapshots: Arc<SnapshotRepo>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            client,
            snapshots,
            config,
        }
    }

    /// Builds one full snapshot tree. Fails with `CollectorAborted` on
    /// cancellation (the zeroed root and any persisted subtrees remain) and
    /// propagates discovery or root-insert failures.
    pub async fn collect(
        &self,
        mut cancel: watch::Receiver<bool>,
        progress: &dyn ProgressSink,
    ) -> Result<CollectResult> {
        let start = Instant::now();
        let collected_at = chrono::Utc::now().timestamp();

        let snapshot_id = self.snapshots.create_snapshot(collected_at).await?;
        info!(snapshot_id, collected_at, "starting scan");

        progress.progress("discovering", 0, 0, "");
        let services = tokio::select! {
            result = self.client.discover_services(&self.config.service_label) => result?,
            _ = wait_cancelled(&mut cancel) => {
                return Err(Error::CollectorAborted("cancelled during discovery".into()));
            }
        };
        info!(count = services.len(), "discovered services");

        let total = services.len();
        let sem = Arc::new(Semaphore::new(self.config.concurrency));
        let totals = Arc::new(Mutex::new(ScanTotals::default()));
        let mut tasks = Vec::with_capacity(total);
        let mut aborted = false;

        for (i, service) in services.into_iter().enumerate() {
            if *cancel.borrow() {
                aborted = true;
                break;
            }
            let permit = tokio::select! {
                permit = sem.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
                _ = wait_cancelled(&mut cancel) => {
                    aborted = true;
                    break;
                }
            };
            progress.progress("scanning", i + 1, total, &service.name);

            let client = self.client.clone();
            let snapshots = self.snapshots.clone();
            let config = self.config.clone();
            let totals = totals.clone();
            let cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                scan_service(client, snapshots, config, snapshot_id, service, totals, cancel)
                    .await;
            }));
        }

        for task in tasks {
            let _ = task.await;
        }

        if aborted || *cancel.borrow() {
            return Err(Error::CollectorAborted("scan cancelled".into()));
        }

        let (total_services, total_series) = {
            let t = totals.lock().unwrap_or_else(|e| e.into_inner());
            (t.services, t.series)
        };
        let duration = start.elapsed();
        self.snapshots
            .finalize_snapshot(
                snapshot_id,
                total_services,
                total_series,
                duration.as_millis() as i64,
            )
            .await?;

        info!(
            snapshot_id,
            total_services,
            total_series,
            duration_ms = duration.as_millis() as u64,
            "scan complete"
        );

        Ok(CollectResult {
            snapshot_id,
            total_services,
            total_series,
            duration,
        })
    }
}

/// Scans one service and persists its subtree. Never fails the scan: errors
/// and timeouts are logged and the service is skipped.
async fn scan_service(
    client: Arc<PromClient>,
    snapshots: Arc<SnapshotRepo>,
    config: CollectorConfig,
    snapshot_id: i64,
    service: ServiceInfo,
    totals: Arc<Mutex<ScanTotals>>,
    mut cancel: watch::Receiver<bool>,
) {
    let name = service.name.clone();
    let scan = tokio::time::timeout(
        SERVICE_SCAN_TIMEOUT,
        build_service_record(&client, &config, &service),
    );
    let record = tokio::select! {
        result = scan => match result {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => {
                warn!(service = %name, error = %e, "failed to scan service");
                return;
            }
            Err(_) => {
                warn!(service = %name, timeout_secs = SERVICE_SCAN_TIMEOUT.as_secs(), "service scan timed out");
                return;
            }
        },
        _ = wait_cancelled(&mut cancel) => return,
    };

    if let Err(e) = snapshots.insert_service_tree(snapshot_id, &record).await {
        warn!(service = %name, error = %e, "failed to persist service");
        return;
    }

    let mut t = totals.lock().unwrap_or_else(|e| e.into_inner());
    t.services += 1;
    t.series += record.total_series;
}

async fn build_service_record(
    client: &PromClient,
    config: &CollectorConfig,
    service: &ServiceInfo,
) -> Result<ServiceScanRecord> {
    let metrics = client
        .get_metrics_for_service(&config.service_label, &service.name)
        .await?;

    let mut records = Vec::with_capacity(metrics.len());
    for metric in metrics {
        let skip_labels =
            config.label_fetch_threshold > 0 && metric.series_count > config.label_fetch_threshold;
        let labels = if skip_labels {
            debug!(
                service = %service.name,
                metric = %metric.name,
                series = metric.series_count,
                "series count above label fetch threshold, skipping labels"
            );
            Vec::new()
        } else {
            match client
                .get_labels_for_metric(
                    &config.service_label,
                    &service.name,
                    &metric.name,
                    config.sample_values_limit,
                )
                .await
            {
                Ok(labels) => labels
                    .into_iter()
                    .map(|l| LabelScanRecord {
                        label_name: l.name,
                        unique_values_count: l.unique_values,
                        sample_values: l.sample_values,
                    })
                    .collect(),
                Err(e) => {
                    debug!(
                        service = %service.name,
                        metric = %metric.name,
                        error = %e,
                        "label fetch failed, keeping metric with empty label set"
                    );
                    Vec::new()
                }
            }
        };
        records.push(MetricScanRecord {
            metric_name: metric.name,
            series_count: metric.series_count,
            labels,
        });
    }

    Ok(ServiceScanRecord {
        service_name: service.name.clone(),
        total_series: service.series_count,
        metrics: records,
    })
}

/// Resolves once the watch flag turns true. Never resolves if the sender is
/// gone, which reads as "cancellation can no longer happen".
pub(crate) async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
