// Domain models: the snapshot tree, analyses, and status views.

mod analysis;
mod snapshot;
mod status;

pub use analysis::{AnalysisStatus, SnapshotAnalysis, ToolCall};
pub use snapshot::{LabelSnapshot, MetricSnapshot, ServiceSnapshot, Snapshot};
pub use status::{AnalysisGlobalStatus, HealthStatus, ScanStatus};
