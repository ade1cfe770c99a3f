// Analysis endpoints. All of them 503 when the analyzer is not configured.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

use super::AppState;
use crate::analyzer::Analyzer;
use crate::error::Error;

fn analyzer(state: &AppState) -> Result<&Arc<Analyzer>, Error> {
    state.analyzer.as_ref().ok_or(Error::AnalyzerDisabled)
}

#[derive(Debug, Deserialize)]
pub(super) struct AnalysisRequest {
    pub current_snapshot_id: i64,
    pub previous_snapshot_id: i64,
}

/// POST /api/analysis — starts (or returns) an analysis for a pair.
pub(super) async fn start_analysis(
    State(state): State<AppState>,
    Json(req): Json<AnalysisRequest>,
) -> Result<impl IntoResponse, Error> {
    if req.current_snapshot_id <= 0 || req.previous_snapshot_id <= 0 {
        return Err(Error::Validation(
            "current_snapshot_id and previous_snapshot_id must be positive".to_string(),
        ));
    }
    let analysis = analyzer(&state)?
        .start_analysis(req.current_snapshot_id, req.previous_snapshot_id)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(analysis)))
}

#[derive(Debug, Deserialize)]
pub(super) struct PairQuery {
    pub current: i64,
    pub previous: i64,
}

/// GET /api/analysis?current=&previous=
pub(super) async fn get_analysis(
    State(state): State<AppState>,
    Query(q): Query<PairQuery>,
) -> Result<impl IntoResponse, Error> {
    let analysis = analyzer(&state)?
        .get_analysis(q.current, q.previous)
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!(
                "no analysis for snapshots {} vs {}",
                q.current, q.previous
            ))
        })?;
    Ok(Json(analysis))
}

/// DELETE /api/analysis?current=&previous= — idempotent.
pub(super) async fn delete_analysis(
    State(state): State<AppState>,
    Query(q): Query<PairQuery>,
) -> Result<impl IntoResponse, Error> {
    analyzer(&state)?.delete_analysis(q.current, q.previous).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/analysis/status
pub(super) async fn analysis_status(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, Error> {
    Ok(Json(analyzer(&state)?.get_global_status()))
}

#[derive(Debug, Deserialize)]
pub(super) struct SnapshotQuery {
    pub snapshot_id: i64,
}

/// GET /api/analysis/list?snapshot_id= — analyses on either side.
pub(super) async fn list_analyses(
    State(state): State<AppState>,
    Query(q): Query<SnapshotQuery>,
) -> Result<impl IntoResponse, Error> {
    let analyses = analyzer(&state)?.list_analyses(q.snapshot_id).await?;
    Ok(Json(analyses))
}
