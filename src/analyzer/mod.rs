// LLM analysis of a snapshot pair: lifecycle, concurrency guard, status.
// The dialogue itself lives in runner.rs.

mod gemini;
mod prompt;
mod runner;
mod tools;

pub use gemini::GeminiClient;
pub use tools::ToolExecutor;

use crate::analysis_repo::AnalysisRepo;
use crate::error::{Error, Result};
use crate::models::{AnalysisGlobalStatus, AnalysisStatus, SnapshotAnalysis};
use crate::snapshot_repo::SnapshotRepo;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Hard cap on (model turn → tool call) exchanges per analysis.
pub const MAX_ITERATIONS: usize = 20;

pub struct Analyzer {
    inner: Arc<AnalyzerInner>,
}

struct AnalyzerInner {
    gemini: GeminiClient,
    snapshots: Arc<SnapshotRepo>,
    analyses: Arc<AnalysisRepo>,
    tools: ToolExecutor,
    status: Mutex<AnalysisGlobalStatus>,
    job: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Analyzer {
    pub fn new(
        gemini: GeminiClient,
        snapshots: Arc<SnapshotRepo>,
        analyses: Arc<AnalysisRepo>,
    ) -> Self {
        let tools = ToolExecutor::new(snapshots.clone());
        Self {
            inner: Arc::new(AnalyzerInner {
                gemini,
                snapshots,
                analyses,
                tools,
                status: Mutex::new(AnalysisGlobalStatus::default()),
                job: tokio::sync::Mutex::new(None),
            }),
        }
    }

    /// Resolves both snapshots (fails fast when either is missing), returns
    /// an existing completed analysis for the pair, otherwise inserts a
    /// pending row and launches the background job. At most one analysis
    /// runs at a time.
    pub async fn start_analysis(
        &self,
        current_id: i64,
        previous_id: i64,
    ) -> Result<SnapshotAnalysis> {
        let current = self
            .inner
            .snapshots
            .get_by_id(current_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("snapshot {} not found", current_id)))?;
        let previous = self
            .inner
            .snapshots
            .get_by_id(previous_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("snapshot {} not found", previous_id)))?;

        let existing = self.inner.analyses.get_by_pair(current_id, previous_id).await?;
        if let Some(existing) = &existing {
            if existing.status == AnalysisStatus::Completed {
                info!(analysis_id = existing.id, "returning existing completed analysis");
                return Ok(existing.clone());
            }
        }

        {
            let mut status = self.inner.status.lock().unwrap_or_else(|e| e.into_inner());
            if status.running {
                return Err(Error::AnalysisAlreadyRunning {
                    current: status.current_snapshot_id,
                    previous: status.previous_snapshot_id,
                });
            }
            *status = AnalysisGlobalStatus {
                running: true,
                current_snapshot_id: current_id,
                previous_snapshot_id: previous_id,
                progress: "Initializing".to_string(),
            };
        }

        // A leftover non-completed row (failed, or stranded by a crash) gives
        // way to a fresh run; the pair stays unique.
        let created = async {
            if existing.is_some() {
                self.inner.analyses.delete(current_id, previous_id).await?;
            }
            self.inner.analyses.create(current_id, previous_id).await
        }
        .await;
        let mut analysis = match created {
            Ok(analysis) => analysis,
            Err(e) => {
                let mut status = self.inner.status.lock().unwrap_or_else(|e| e.into_inner());
                *status = AnalysisGlobalStatus::default();
                return Err(e);
            }
        };

        let inner = self.inner.clone();
        let job_analysis = analysis.clone();
        let handle = tokio::spawn(async move {
            runner::run_analysis(inner, job_analysis, current, previous).await;
        });
        {
            let mut job = self.inner.job.lock().await;
            *job = Some(handle);
        }

        analysis.status = AnalysisStatus::Running;
        Ok(analysis)
    }

    pub async fn get_analysis(
        &self,
        current_id: i64,
        previous_id: i64,
    ) -> Result<Option<SnapshotAnalysis>> {
        self.inner.analyses.get_by_pair(current_id, previous_id).await
    }

    pub async fn list_analyses(&self, snapshot_id: i64) -> Result<Vec<SnapshotAnalysis>> {
        self.inner.analyses.list_by_snapshot(snapshot_id).await
    }

    pub async fn delete_analysis(&self, current_id: i64, previous_id: i64) -> Result<()> {
        self.inner.analyses.delete(current_id, previous_id).await
    }

    pub fn get_global_status(&self) -> AnalysisGlobalStatus {
        self.inner
            .status
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Waits for a running background job, if any.
    pub async fn shutdown(&self) {
        let handle = {
            let mut job = self.inner.job.lock().await;
            job.take()
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "analysis job did not shut down cleanly");
            }
        }
    }
}
