use serde::{Deserialize, Serialize};

/// Scheduler status view. Read and written as a whole record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStatus {
    pub running: bool,
    /// Unix seconds of the last finished scan, if any.
    pub last_scan_at: Option<i64>,
    pub last_duration_ms: Option<i64>,
    pub last_error: Option<String>,
    /// Unix seconds of the next periodic tick, if the scheduler is running.
    pub next_scan_at: Option<i64>,
}

/// Analyzer status view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisGlobalStatus {
    pub running: bool,
    pub current_snapshot_id: i64,
    pub previous_snapshot_id: i64,
    /// Free-text phase label updated by the running job.
    pub progress: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub database_ok: bool,
    pub prometheus_connected: bool,
    /// collected_at of the latest snapshot, unix seconds.
    pub last_scan: Option<i64>,
}
