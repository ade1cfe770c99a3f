// Periodic scan orchestration. One scan at a time: ticks and manual
// triggers share a try-lock gate, and stop() waits until nothing is in
// flight. Outcomes land in a single mutex-guarded status record.

use crate::collector::{CollectResult, Collector, LogProgress};
use crate::error::{Error, Result};
use crate::models::ScanStatus;
use crate::snapshot_repo::SnapshotRepo;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    /// Snapshots older than this many days are deleted after each scan.
    /// 0 disables cleanup.
    pub retention_days: u32,
}

pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    collector: Arc<Collector>,
    snapshots: Arc<SnapshotRepo>,
    config: SchedulerConfig,
    status: Mutex<ScanStatus>,
    cancel_tx: watch::Sender<bool>,
    scan_gate: tokio::sync::Mutex<()>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        collector: Arc<Collector>,
        snapshots: Arc<SnapshotRepo>,
        config: SchedulerConfig,
    ) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                collector,
                snapshots,
                config,
                status: Mutex::new(ScanStatus::default()),
                cancel_tx,
                scan_gate: tokio::sync::Mutex::new(()),
                loop_handle: Mutex::new(None),
            }),
        }
    }

    /// Spawns the periodic loop. The first scan runs one interval from now.
    pub fn start(&self) {
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let period = inner.config.interval;
            let mut tick =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut cancel = inner.cancel_tx.subscribe();
            inner.set_next_scan_at(Some(period));

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        match run_scan(&inner).await {
                            Ok(result) => {
                                debug!(snapshot_id = result.snapshot_id, "periodic scan finished");
                            }
                            Err(Error::ScanAlreadyRunning) => {
                                debug!("tick skipped, a scan is already in flight");
                            }
                            Err(e) => warn!(error = %e, "periodic scan failed"),
                        }
                        inner.set_next_scan_at(Some(period));
                    }
                    _ = crate::collector::wait_cancelled(&mut cancel) => break,
                }
            }
        });
        let mut slot = self.inner.loop_handle.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(handle);
    }

    /// Runs a scan now, in the caller's task. Fails with `ScanAlreadyRunning`
    /// when one is in flight; the request is not queued.
    pub async fn trigger_scan(&self) -> Result<CollectResult> {
        run_scan(&self.inner).await
    }

    /// Idempotent. Cancels any in-flight scan and returns only once both the
    /// periodic loop and any trigger-driven scan have finished.
    pub async fn stop(&self) {
        // send_replace flips the flag even when no receiver is subscribed yet.
        self.inner.cancel_tx.send_replace(true);
        let handle = {
            let mut slot = self.inner.loop_handle.lock().unwrap_or_else(|e| e.into_inner());
            slot.take()
        };
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        // Wait out a scan running in some caller's task.
        let _ = self.inner.scan_gate.lock().await;
        self.inner.set_next_scan_at(None);
        info!("scheduler stopped");
    }

    pub fn get_status(&self) -> ScanStatus {
        self.inner
            .status
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Inner {
    fn set_next_scan_at(&self, from_now: Option<Duration>) {
        let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
        status.next_scan_at =
            from_now.map(|d| chrono::Utc::now().timestamp() + d.as_secs() as i64);
    }
}

/// Flips `running` back off even when the scan future is dropped mid-flight.
struct RunningGuard<'a> {
    inner: &'a Inner,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let mut status = self.inner.status.lock().unwrap_or_else(|e| e.into_inner());
        status.running = false;
    }
}

async fn run_scan(inner: &Inner) -> Result<CollectResult> {
    let _gate = inner
        .scan_gate
        .try_lock()
        .map_err(|_| Error::ScanAlreadyRunning)?;
    if *inner.cancel_tx.borrow() {
        return Err(Error::Cancelled);
    }

    {
        let mut status = inner.status.lock().unwrap_or_else(|e| e.into_inner());
        status.running = true;
        status.last_error = None;
    }
    let _running = RunningGuard { inner };

    let cancel_rx = inner.cancel_tx.subscribe();
    let outcome = inner.collector.collect(cancel_rx, &LogProgress).await;

    {
        let mut status = inner.status.lock().unwrap_or_else(|e| e.into_inner());
        match &outcome {
            Ok(result) => {
                status.last_scan_at = Some(chrono::Utc::now().timestamp());
                status.last_duration_ms = Some(result.duration.as_millis() as i64);
                status.last_error = None;
            }
            Err(e) => {
                status.last_error = Some(e.to_string());
            }
        }
    }

    if outcome.is_ok() && inner.config.retention_days > 0 {
        match inner
            .snapshots
            .delete_older_than(inner.config.retention_days)
            .await
        {
            Ok(deleted) => info!(
                deleted,
                retention_days = inner.config.retention_days,
                "retention cleanup complete"
            ),
            Err(e) => warn!(error = %e, "retention cleanup failed"),
        }
    }

    outcome
}
