// HTTP API over the stored snapshot graph, scan control and the analyzer.

mod analysis;
mod http;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::analyzer::Analyzer;
use crate::prom_client::PromClient;
use crate::scheduler::Scheduler;
use crate::snapshot_repo::SnapshotRepo;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) snapshots: Arc<SnapshotRepo>,
    pub(crate) scheduler: Arc<Scheduler>,
    /// None when no [gemini] config section is present.
    pub(crate) analyzer: Option<Arc<Analyzer>>,
    pub(crate) prom: Arc<PromClient>,
}

pub fn app(
    snapshots: Arc<SnapshotRepo>,
    scheduler: Arc<Scheduler>,
    analyzer: Option<Arc<Analyzer>>,
    prom: Arc<PromClient>,
) -> Router {
    let state = AppState {
        snapshots,
        scheduler,
        analyzer,
        prom,
    };
    Router::new()
        .route("/version", get(http::version_handler))
        .route("/api/health", get(http::health_handler))
        .route("/api/scans", get(http::list_scans))
        .route("/api/scans/latest", get(http::latest_scan))
        .route("/api/scans/status", get(http::scan_status))
        .route("/api/scans/trigger", post(http::trigger_scan))
        .route("/api/scans/{id}", get(http::get_scan))
        .route("/api/scans/{id}/services", get(http::list_scan_services))
        .route(
            "/api/scans/{id}/services/{service}/metrics",
            get(http::list_service_metrics),
        )
        .route(
            "/api/scans/{id}/services/{service}/metrics/{metric}/labels",
            get(http::list_metric_labels),
        )
        .route(
            "/api/analysis",
            post(analysis::start_analysis)
                .get(analysis::get_analysis)
                .delete(analysis::delete_analysis),
        )
        .route("/api/analysis/status", get(analysis::analysis_status))
        .route("/api/analysis/list", get(analysis::list_analyses))
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
