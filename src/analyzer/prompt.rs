// Tool declarations and the seeded opening prompt.

use super::MAX_ITERATIONS;
use super::gemini::{FunctionDeclaration, Tool};
use crate::models::{ServiceSnapshot, Snapshot};
use serde_json::json;

pub(super) fn tool_declarations() -> Vec<Tool> {
    vec![Tool {
        function_declarations: vec![
            FunctionDeclaration {
                name: "get_service_metrics".to_string(),
                description: "Get all metrics for a service in a snapshot".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "snapshot_id": {"type": "integer", "description": "ID of the snapshot"},
                        "service_name": {"type": "string", "description": "Name of the service"}
                    },
                    "required": ["snapshot_id", "service_name"]
                }),
            },
            FunctionDeclaration {
                name: "get_metric_labels".to_string(),
                description: "Get all labels for a specific metric".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "snapshot_id": {"type": "integer", "description": "ID of the snapshot"},
                        "service_name": {"type": "string", "description": "Name of the service"},
                        "metric_name": {"type": "string", "description": "Name of the metric"}
                    },
                    "required": ["snapshot_id", "service_name", "metric_name"]
                }),
            },
            FunctionDeclaration {
                name: "compare_services".to_string(),
                description: "Compare a service between two snapshots to see added/removed metrics and series count changes".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "current_snapshot_id": {"type": "integer", "description": "ID of the current snapshot"},
                        "previous_snapshot_id": {"type": "integer", "description": "ID of the previous snapshot"},
                        "service_name": {"type": "string", "description": "Name of the service"}
                    },
                    "required": ["current_snapshot_id", "previous_snapshot_id", "service_name"]
                }),
            },
        ],
    }]
}

pub(super) fn build_prompt(
    current: &Snapshot,
    previous: &Snapshot,
    current_services: &[ServiceSnapshot],
    previous_services: &[ServiceSnapshot],
) -> String {
    format!(
        r#"You are an expert monitoring system analyzer specializing in Prometheus metrics analysis. Your goals:
1. Identify significant changes between two snapshots
2. Detect high cardinality issues and anti-patterns (IDs, UUIDs, URLs in labels)

# Available Tools

You have EXACTLY 3 tools. Do NOT attempt to call any other tools or add parameters not listed:

1. get_service_metrics(snapshot_id, service_name)
   - Returns: All metrics for the specified service in the given snapshot

2. get_metric_labels(snapshot_id, service_name, metric_name)
   - Returns: All label combinations for a specific metric

3. compare_services(current_snapshot_id, previous_snapshot_id, service_name)
   - Returns: Comparison showing added/removed metrics and series count changes
---
Current snapshot (ID: {current_id}):
- Collected at: {current_at}
- Total services: {current_services_count}
- Total series: {current_series}
Services in this snapshot:
{current_list}
---
Previous snapshot (ID: {previous_id}):
- Collected at: {previous_at}
- Total services: {previous_services_count}
- Total series: {previous_series}
Services in previous snapshot:
{previous_list}
---
# Analysis Strategy

## Phase 1: Change Detection (2-3 tool calls)
- Use compare_services on 2-3 services with notable series count differences
- Identify new/removed services from the lists above (no tool needed)

## Phase 2: Cardinality Analysis (3-4 tool calls)
**CRITICAL**: Focus on detecting anti-patterns in the CURRENT snapshot:

For services with >1000 series OR >50 percents series growth:
1. Use get_service_metrics to identify metrics with high series counts
2. Use get_metric_labels on metrics with >100 series to examine label patterns

**Red flags to detect:**
- Label values containing UUIDs/GUIDs (patterns: 8-4-4-4-12 hex digits)
- Transaction/payment/request IDs in labels (numeric IDs >6 digits, alphanumeric codes)
- User IDs, account IDs, merchant IDs in labels
- URLs or paths with variable IDs (e.g., /api/transactions/12345/status)
- Timestamps or dates in label values
- Session tokens or correlation IDs
- Email addresses or personal identifiers

**Healthy patterns:**
- Bounded enums (status: success/failed/pending)
- Service names, environment, region, availability zone
- HTTP methods, response codes (2xx, 4xx, 5xx ranges)
- Provider names (limited set)
- Payment methods (card, wallet, bank_transfer - limited set)

## Phase 3: Stop Condition
- Never call the same tool with identical parameters twice
- Stop after 7-8 total tool calls or when you have enough data
- If a tool returns no useful insights, move to different service/metric

# Output Format

## High Cardinality Issues (if found)
For each problematic metric:
- **Metric**: service_name.metric_name
- **Series count**: X
- **Problem**: [ID pattern in label_name: sample values]
- **Impact**: Estimated memory/storage overhead
- **Fix**: Remove label or use constant value

## Significant Changes
**Critical** (1-2 points):
- New/removed services, >50 percents series changes, new metric types

**Notable** (1-2 points):
- 20-50 percents series changes, cardinality increases

## Recommendations
Priority-ordered action items (max 3):
1. [Most urgent - usually cardinality fixes]
2. [Investigation needed]
3. [Monitoring adjustments]

Keep total analysis under 200 words. Prioritize cardinality issues over normal changes.

# Detection Heuristics

When examining label values with get_metric_labels:

**UUID/GUID patterns:**
- 32 hex chars with/without dashes: 550e8400-e29b-41d4-a716-446655440000
- Look for: [0-9a-f]{{8}}-[0-9a-f]{{4}}-[0-9a-f]{{4}}-[0-9a-f]{{4}}-[0-9a-f]{{12}}

**ID patterns:**
- Long numeric sequences: transaction_id="123456789012"
- Alphanumeric codes: payment_id="PAY_abc123xyz456"
- Prefixed IDs: merchant_id="MER_12345"

**URL/Path patterns:**
- /api/users/12345/transactions
- /payments/550e8400-e29b-41d4-a716-446655440000/status

**Safe cardinality check:**
If a label has >50 unique values, it's likely unbounded and needs investigation.

# Important Constraints

- Use ONLY the snapshot IDs provided above
- Maximum {max_iterations} tool calls total
- Prioritize CURRENT snapshot cardinality analysis over historical comparison
- Assume operator understands Prometheus and payment systems
- Be specific: show actual problematic label values as examples"#,
        current_id = current.id,
        current_at = format_timestamp(current.collected_at),
        current_services_count = current.total_services,
        current_series = current.total_series,
        current_list = format_service_list(current_services),
        previous_id = previous.id,
        previous_at = format_timestamp(previous.collected_at),
        previous_services_count = previous.total_services,
        previous_series = previous.total_series,
        previous_list = format_service_list(previous_services),
        max_iterations = MAX_ITERATIONS,
    )
}

fn format_timestamp(unix_secs: i64) -> String {
    chrono::DateTime::from_timestamp(unix_secs, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| unix_secs.to_string())
}

fn format_service_list(services: &[ServiceSnapshot]) -> String {
    if services.is_empty() {
        return "  (no services)".to_string();
    }
    let mut out = String::new();
    for svc in services {
        out.push_str(&format!(
            "  - {}: {} series ({} metrics)\n",
            svc.service_name, svc.total_series, svc.metric_count
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_includes_both_snapshot_headers() {
        let current = Snapshot {
            id: 5,
            collected_at: 1_700_000_000,
            total_services: 2,
            total_series: 150,
            scan_duration_ms: 900,
        };
        let previous = Snapshot {
            id: 4,
            collected_at: 1_699_913_600,
            total_services: 1,
            total_series: 100,
            scan_duration_ms: 800,
        };
        let services = vec![ServiceSnapshot {
            id: 1,
            snapshot_id: 5,
            service_name: "payments".to_string(),
            total_series: 100,
            metric_count: 12,
        }];

        let prompt = build_prompt(&current, &previous, &services, &[]);
        assert!(prompt.contains("Current snapshot (ID: 5)"));
        assert!(prompt.contains("Previous snapshot (ID: 4)"));
        assert!(prompt.contains("- payments: 100 series (12 metrics)"));
        assert!(prompt.contains("(no services)"));
        assert!(prompt.contains("Maximum 20 tool calls"));
    }

    #[test]
    fn declares_exactly_three_tools() {
        let tools = tool_declarations();
        assert_eq!(tools.len(), 1);
        let names: Vec<&str> = tools[0]
            .function_declarations
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(
            names,
            ["get_service_metrics", "get_metric_labels", "compare_services"]
        );
    }
}
