// The bounded agentic loop. Fatal failures become a failed analysis row;
// tool failures are fed back to the model and the dialogue continues.

use super::{AnalyzerInner, MAX_ITERATIONS, gemini::Part, prompt};
use crate::error::{Error, Result};
use crate::models::{AnalysisStatus, SnapshotAnalysis, Snapshot, ToolCall};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

pub(super) async fn run_analysis(
    inner: Arc<AnalyzerInner>,
    mut analysis: SnapshotAnalysis,
    current: Snapshot,
    previous: Snapshot,
) {
    info!(
        analysis_id = analysis.id,
        current_snapshot = current.id,
        previous_snapshot = previous.id,
        "starting analysis"
    );

    if let Err(e) = run_dialogue(&inner, &mut analysis, &current, &previous).await {
        warn!(analysis_id = analysis.id, error = %e, "analysis failed");
        analysis.status = AnalysisStatus::Failed;
        analysis.error = Some(e.to_string());
        analysis.completed_at = Some(chrono::Utc::now().timestamp());
        if let Err(update_err) = inner.analyses.update(&analysis).await {
            warn!(error = %update_err, "failed to persist failed analysis");
        }
    }

    let mut status = inner.status.lock().unwrap_or_else(|e| e.into_inner());
    *status = Default::default();
}

async fn run_dialogue(
    inner: &AnalyzerInner,
    analysis: &mut SnapshotAnalysis,
    current: &Snapshot,
    previous: &Snapshot,
) -> Result<()> {
    analysis.status = AnalysisStatus::Running;
    inner.analyses.update(analysis).await?;

    let current_services = inner.snapshots.list_services(current.id).await?;
    let previous_services = inner.snapshots.list_services(previous.id).await?;
    let opening = prompt::build_prompt(current, previous, &current_services, &previous_services);

    set_progress(inner, "Calling model");
    let mut chat = inner.gemini.chat(prompt::tool_declarations());
    let mut resp = chat.send(vec![Part::text(opening)]).await?;

    for iteration in 1..=MAX_ITERATIONS {
        let content = resp
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .ok_or(Error::EmptyModelResponse)?;

        let Some(call) = content.parts.iter().find_map(|p| p.function_call.clone()) else {
            break;
        };

        info!(iteration, tool = %call.name, "executing tool");
        set_progress(
            inner,
            &format!("Executing tool: {} (iteration {})", call.name, iteration),
        );

        let result = match inner.tools.execute(&call.name, &call.args).await {
            Ok(value) => value,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "tool execution failed");
                json!({ "error": e.to_string() })
            }
        };

        analysis.tool_calls.push(ToolCall {
            name: call.name.clone(),
            args: serde_json::Value::Object(call.args.clone()),
            result: result.clone(),
        });
        if let Err(e) = inner.analyses.update(analysis).await {
            warn!(error = %e, "failed to persist tool call");
        }

        resp = chat
            .send(vec![Part::function_response(call.name, result)])
            .await?;
    }

    set_progress(inner, "Generating final analysis");

    let mut final_text = String::new();
    if let Some(content) = resp.candidates.first().and_then(|c| c.content.as_ref()) {
        for part in &content.parts {
            if part.thought {
                continue;
            }
            if let Some(text) = &part.text {
                final_text.push_str(text);
            }
        }
    }
    if final_text.is_empty() {
        warn!(analysis_id = analysis.id, "empty final response from model");
        final_text = "No analysis generated.".to_string();
    }

    info!(
        analysis_id = analysis.id,
        tool_calls = analysis.tool_calls.len(),
        "analysis completed"
    );

    analysis.status = AnalysisStatus::Completed;
    analysis.result = Some(final_text);
    analysis.completed_at = Some(chrono::Utc::now().timestamp());
    inner.analyses.update(analysis).await?;

    set_progress(inner, "Completed");
    Ok(())
}

fn set_progress(inner: &AnalyzerInner, progress: &str) {
    let mut status = inner.status.lock().unwrap_or_else(|e| e.into_inner());
    status.progress = progress.to_string();
}
