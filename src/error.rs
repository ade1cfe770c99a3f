// Error taxonomy shared by the client, collector, scheduler and analyzer.
// anyhow stays at the app boundary (main, config); everything the API
// surface needs to map to a status code goes through this enum.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// Transport-level failure talking to the metrics backend.
    BackendUnavailable(String),
    /// Backend answered with status != "success".
    Backend(String),
    /// Malformed response envelope or unexpected shape.
    Parse(String),
    /// Persistence failure.
    Repository(String),
    /// Requested row does not exist.
    NotFound(String),
    /// Ambient deadline elapsed or shutdown requested.
    Cancelled,
    /// Scan aborted before a useful snapshot could be completed.
    CollectorAborted(String),
    /// A scan is already in flight.
    ScanAlreadyRunning,
    /// An analysis is already in flight.
    AnalysisAlreadyRunning { current: i64, previous: i64 },
    /// LLM returned no candidate content.
    EmptyModelResponse,
    /// Tool invoked with missing or ill-typed arguments.
    ToolArg(String),
    /// Invalid config or request input.
    Validation(String),
    /// Analyzer is not configured (no [gemini] section).
    AnalyzerDisabled,
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BackendUnavailable(msg) => write!(f, "backend unavailable: {}", msg),
            Self::Backend(msg) => write!(f, "backend returned error: {}", msg),
            Self::Parse(msg) => write!(f, "parse error: {}", msg),
            Self::Repository(msg) => write!(f, "repository error: {}", msg),
            Self::NotFound(msg) => write!(f, "not found: {}", msg),
            Self::Cancelled => write!(f, "cancelled"),
            Self::CollectorAborted(msg) => write!(f, "scan aborted: {}", msg),
            Self::ScanAlreadyRunning => write!(f, "a scan is already running"),
            Self::AnalysisAlreadyRunning { current, previous } => write!(
                f,
                "another analysis is already running (snapshots {} vs {})",
                current, previous
            ),
            Self::EmptyModelResponse => write!(f, "received an empty response from the model"),
            Self::ToolArg(msg) => write!(f, "invalid tool argument: {}", msg),
            Self::Validation(msg) => write!(f, "validation error: {}", msg),
            Self::AnalyzerDisabled => write!(f, "analyzer is not configured"),
        }
    }
}

impl std::error::Error for Error {}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("row not found".into()),
            other => Self::Repository(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::BackendUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) | Self::ToolArg(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ScanAlreadyRunning | Self::AnalysisAlreadyRunning { .. } => StatusCode::CONFLICT,
            Self::AnalyzerDisabled => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
