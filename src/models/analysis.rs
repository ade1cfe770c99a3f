use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One recorded tool invocation: arguments as received, result as returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub args: serde_json::Value,
    pub result: serde_json::Value,
}

/// LLM analysis of a snapshot pair. Terminal once completed or failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotAnalysis {
    pub id: i64,
    pub current_snapshot_id: i64,
    pub previous_snapshot_id: i64,
    pub status: AnalysisStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    /// Unix seconds.
    pub created_at: i64,
    /// Unix seconds; set only in completed or failed state.
    pub completed_at: Option<i64>,
}
