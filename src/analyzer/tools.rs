// Tool execution against the snapshot store. The tool set is closed; the
// model sends loosely typed arguments, so numeric coercion is defensive.

use crate::error::{Error, Result};
use crate::snapshot_repo::{MetricListOptions, SnapshotRepo};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct ToolExecutor {
    snapshots: Arc<SnapshotRepo>,
}

impl ToolExecutor {
    pub fn new(snapshots: Arc<SnapshotRepo>) -> Self {
        Self { snapshots }
    }

    pub async fn execute(&self, name: &str, args: &Map<String, Value>) -> Result<Value> {
        match name {
            "get_service_metrics" => self.get_service_metrics(args).await,
            "get_metric_labels" => self.get_metric_labels(args).await,
            "compare_services" => self.compare_services(args).await,
            other => Err(Error::ToolArg(format!("unknown tool: {}", other))),
        }
    }

    async fn get_service_metrics(&self, args: &Map<String, Value>) -> Result<Value> {
        let snapshot_id = snapshot_id_arg(args, "snapshot_id")?;
        let service_name = str_arg(args, "service_name")?;

        let service = self
            .snapshots
            .get_service_by_name(snapshot_id, service_name)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "service {} not found in snapshot {}",
                    service_name, snapshot_id
                ))
            })?;
        let metrics = self
            .snapshots
            .list_metrics(service.id, &MetricListOptions::default())
            .await?;

        Ok(json!({
            "snapshot_id": snapshot_id,
            "service_name": service.service_name,
            "total_series": service.total_series,
            "metrics": metrics.iter().map(|m| json!({
                "name": m.metric_name,
                "series_count": m.series_count,
                "label_count": m.label_count,
            })).collect::<Vec<_>>(),
        }))
    }

    async fn get_metric_labels(&self, args: &Map<String, Value>) -> Result<Value> {
        let snapshot_id = snapshot_id_arg(args, "snapshot_id")?;
        let service_name = str_arg(args, "service_name")?;
        let metric_name = str_arg(args, "metric_name")?;

        let service = self
            .snapshots
            .get_service_by_name(snapshot_id, service_name)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "service {} not found in snapshot {}",
                    service_name, snapshot_id
                ))
            })?;
        let metric = self
            .snapshots
            .get_metric_by_name(service.id, metric_name)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "metric {} not found for service {}",
                    metric_name, service_name
                ))
            })?;
        let labels = self.snapshots.list_labels(metric.id).await?;

        Ok(json!({
            "snapshot_id": snapshot_id,
            "service_name": service.service_name,
            "metric_name": metric.metric_name,
            "series_count": metric.series_count,
            "labels": labels.iter().map(|l| json!({
                "name": l.label_name,
                "unique_values": l.unique_values_count,
                "sample_values": l.sample_values,
            })).collect::<Vec<_>>(),
        }))
    }

    async fn compare_services(&self, args: &Map<String, Value>) -> Result<Value> {
        let current_id = snapshot_id_arg(args, "current_snapshot_id")?;
        let previous_id = snapshot_id_arg(args, "previous_snapshot_id")?;
        let service_name = str_arg(args, "service_name")?;

        let current = self
            .snapshots
            .get_service_by_name(current_id, service_name)
            .await?;
        let previous = self
            .snapshots
            .get_service_by_name(previous_id, service_name)
            .await?;
        if current.is_none() && previous.is_none() {
            return Err(Error::NotFound(format!(
                "service {} not found in snapshot {} or {}",
                service_name, current_id, previous_id
            )));
        }

        let current_metrics = match &current {
            Some(svc) => self.metric_counts(svc.id).await?,
            None => BTreeMap::new(),
        };
        let previous_metrics = match &previous {
            Some(svc) => self.metric_counts(svc.id).await?,
            None => BTreeMap::new(),
        };

        let added: Vec<&String> = current_metrics
            .keys()
            .filter(|name| !previous_metrics.contains_key(*name))
            .collect();
        let removed: Vec<&String> = previous_metrics
            .keys()
            .filter(|name| !current_metrics.contains_key(*name))
            .collect();
        let changed: Vec<Value> = current_metrics
            .iter()
            .filter_map(|(name, current_series)| {
                let previous_series = previous_metrics.get(name)?;
                if current_series == previous_series {
                    return None;
                }
                Some(json!({
                    "metric_name": name,
                    "previous_series": previous_series,
                    "current_series": current_series,
                    "delta": current_series - previous_series,
                }))
            })
            .collect();

        Ok(json!({
            "service_name": service_name,
            "current": side_summary(current.as_ref()),
            "previous": side_summary(previous.as_ref()),
            "added_metrics": added,
            "removed_metrics": removed,
            "changed_metrics": changed,
        }))
    }

    async fn metric_counts(&self, service_snapshot_id: i64) -> Result<BTreeMap<String, i64>> {
        let metrics = self
            .snapshots
            .list_metrics(service_snapshot_id, &MetricListOptions::default())
            .await?;
        Ok(metrics
            .into_iter()
            .map(|m| (m.metric_name, m.series_count))
            .collect())
    }
}

fn side_summary(service: Option<&crate::models::ServiceSnapshot>) -> Value {
    match service {
        Some(svc) => json!({
            "present": true,
            "total_series": svc.total_series,
            "metric_count": svc.metric_count,
        }),
        None => json!({ "present": false }),
    }
}

/// Accepts integer, floating-point, and numeric-string forms.
fn int_arg(args: &Map<String, Value>, key: &str) -> Result<i64> {
    let value = args
        .get(key)
        .ok_or_else(|| Error::ToolArg(format!("missing argument: {}", key)))?;
    if let Some(n) = value.as_i64() {
        return Ok(n);
    }
    if let Some(f) = value.as_f64() {
        return Ok(f as i64);
    }
    if let Some(s) = value.as_str() {
        let s = s.trim();
        if let Ok(n) = s.parse::<i64>() {
            return Ok(n);
        }
        if let Ok(f) = s.parse::<f64>() {
            return Ok(f as i64);
        }
    }
    Err(Error::ToolArg(format!(
        "argument {} must be numeric, got {}",
        key, value
    )))
}

fn snapshot_id_arg(args: &Map<String, Value>, key: &str) -> Result<i64> {
    let id = int_arg(args, key)?;
    if id <= 0 {
        return Err(Error::ToolArg(format!(
            "argument {} must be a positive snapshot id, got {}",
            key, id
        )));
    }
    Ok(id)
}

fn str_arg<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::ToolArg(format!("missing argument: {}", key)))
}
