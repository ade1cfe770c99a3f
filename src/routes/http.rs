// GET handlers for scans and health, plus the manual trigger.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use super::AppState;
use crate::error::Error;
use crate::models::HealthStatus;
use crate::snapshot_repo::MetricListOptions;
use crate::version::{NAME, VERSION};

/// GET /version — service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/health — composite: DB reachable, backend reachable, last scan.
pub(super) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut health = HealthStatus {
        status: "healthy".to_string(),
        database_ok: true,
        prometheus_connected: true,
        last_scan: None,
    };

    if state.snapshots.ping().await.is_err() {
        health.status = "unhealthy".to_string();
        health.database_ok = false;
    }
    if state.prom.health_check().await.is_err() {
        health.prometheus_connected = false;
        if health.status == "healthy" {
            health.status = "degraded".to_string();
        }
    }
    if let Ok(Some(latest)) = state.snapshots.get_latest().await {
        health.last_scan = Some(latest.collected_at);
    }

    Json(health)
}

#[derive(Debug, Deserialize)]
pub(super) struct ListQuery {
    pub limit: Option<u32>,
}

/// GET /api/scans?limit= — newest first.
pub(super) async fn list_scans(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<impl IntoResponse, Error> {
    let snapshots = state.snapshots.list(q.limit.unwrap_or(50)).await?;
    Ok(Json(snapshots))
}

/// GET /api/scans/latest
pub(super) async fn latest_scan(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, Error> {
    let snapshot = state
        .snapshots
        .get_latest()
        .await?
        .ok_or_else(|| Error::NotFound("no snapshots yet".to_string()))?;
    Ok(Json(snapshot))
}

/// GET /api/scans/{id}
pub(super) async fn get_scan(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, Error> {
    let snapshot = state
        .snapshots
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("snapshot {} not found", id)))?;
    Ok(Json(snapshot))
}

/// GET /api/scans/{id}/services — ordered by total_series descending.
pub(super) async fn list_scan_services(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, Error> {
    state
        .snapshots
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("snapshot {} not found", id)))?;
    let services = state.snapshots.list_services(id).await?;
    Ok(Json(services))
}

#[derive(Debug, Deserialize)]
pub(super) struct MetricQuery {
    pub sort: Option<String>,
    pub order: Option<String>,
}

/// GET /api/scans/{id}/services/{service}/metrics?sort=&order=
pub(super) async fn list_service_metrics(
    State(state): State<AppState>,
    Path((id, service)): Path<(i64, String)>,
    Query(q): Query<MetricQuery>,
) -> Result<impl IntoResponse, Error> {
    let service = state
        .snapshots
        .get_service_by_name(id, &service)
        .await?
        .ok_or_else(|| Error::NotFound("service not found".to_string()))?;
    let opts = MetricListOptions {
        sort: q.sort,
        order: q.order,
    };
    let metrics = state.snapshots.list_metrics(service.id, &opts).await?;
    Ok(Json(metrics))
}

/// GET /api/scans/{id}/services/{service}/metrics/{metric}/labels
pub(super) async fn list_metric_labels(
    State(state): State<AppState>,
    Path((id, service, metric)): Path<(i64, String, String)>,
) -> Result<impl IntoResponse, Error> {
    let service = state
        .snapshots
        .get_service_by_name(id, &service)
        .await?
        .ok_or_else(|| Error::NotFound("service not found".to_string()))?;
    let metric = state
        .snapshots
        .get_metric_by_name(service.id, &metric)
        .await?
        .ok_or_else(|| Error::NotFound("metric not found".to_string()))?;
    let labels = state.snapshots.list_labels(metric.id).await?;
    Ok(Json(labels))
}

/// POST /api/scans/trigger — runs a scan in this request's task.
pub(super) async fn trigger_scan(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, Error> {
    let result = state.scheduler.trigger_scan().await?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "snapshot_id": result.snapshot_id,
            "total_services": result.total_services,
            "total_series": result.total_series,
            "duration_ms": result.duration.as_millis() as u64,
        })),
    ))
}

/// GET /api/scans/status
pub(super) async fn scan_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.scheduler.get_status())
}
