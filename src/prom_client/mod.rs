// Typed facade over the Prometheus HTTP API via reqwest.
// All queries go through one retrying GET; failures surface to the caller.

mod parse;

use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_SCRAPE_INTERVAL: Duration = Duration::from_secs(15);

/// Retry as pure data: attempt n (n >= 2) waits base_delay * 2^(n-2).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            Duration::ZERO
        } else {
            self.base_delay * 2u32.saturating_pow(attempt - 2)
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromClientConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

/// A discovered service and its total series count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: String,
    pub series_count: i64,
}

/// A metric within a service and its series count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricInfo {
    pub name: String,
    pub series_count: i64,
}

/// A label with its distinct-value cardinality and a bounded sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelInfo {
    pub name: String,
    pub unique_values: i64,
    pub sample_values: Vec<String>,
}

pub struct PromClient {
    base_url: String,
    http: reqwest::Client,
    username: Option<String>,
    password: Option<String>,
    retry: RetryPolicy,
}

impl PromClient {
    pub fn new(cfg: PromClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| Error::BackendUnavailable(e.to_string()))?;
        Ok(Self {
            base_url: cfg.url.trim_end_matches('/').to_string(),
            http,
            username: cfg.username,
            password: cfg.password,
            retry: RetryPolicy::default(),
        })
    }

    /// GET on the health endpoint; any transport or non-2xx failure surfaces.
    pub async fn health_check(&self) -> Result<()> {
        self.get_raw("/-/healthy", &[]).await.map(|_| ())
    }

    /// `count({<label>!=""}) by (<label>)`, series count descending.
    /// Samples with an empty service name are dropped.
    pub async fn discover_services(&self, service_label: &str) -> Result<Vec<ServiceInfo>> {
        let query = format!(r#"count({{{label}!=""}}) by ({label})"#, label = service_label);
        let data = self.query(&query).await?;

        let mut services: Vec<ServiceInfo> = data
            .result
            .iter()
            .filter_map(|sample| {
                let name = sample.metric.get(service_label)?;
                if name.is_empty() {
                    return None;
                }
                Some(ServiceInfo {
                    name: name.clone(),
                    series_count: parse::sample_value(sample),
                })
            })
            .collect();
        services.sort_by(|a, b| b.series_count.cmp(&a.series_count));
        Ok(services)
    }

    /// `count({<label>="<service>"}) by (__name__)`, series count descending.
    pub async fn get_metrics_for_service(
        &self,
        service_label: &str,
        service_name: &str,
    ) -> Result<Vec<MetricInfo>> {
        let query = format!(r#"count({{{service_label}="{service_name}"}}) by (__name__)"#);
        let data = self.query(&query).await?;

        let mut metrics: Vec<MetricInfo> = data
            .result
            .iter()
            .filter_map(|sample| {
                let name = sample.metric.get("__name__")?;
                if name.is_empty() {
                    return None;
                }
                Some(MetricInfo {
                    name: name.clone(),
                    series_count: parse::sample_value(sample),
                })
            })
            .collect();
        metrics.sort_by(|a, b| b.series_count.cmp(&a.series_count));
        Ok(metrics)
    }

    /// Enumerates series for `<metric>{<label>="<service>"}` and aggregates
    /// distinct values per label, excluding `__name__` and the service label.
    /// Samples are deduplicated, sorted, and capped at `sample_limit`;
    /// unique_values always reports the full count.
    pub async fn get_labels_for_metric(
        &self,
        service_label: &str,
        service_name: &str,
        metric_name: &str,
        sample_limit: usize,
    ) -> Result<Vec<LabelInfo>> {
        let selector = format!(r#"{metric_name}{{{service_label}="{service_name}"}}"#);
        let data = self
            .get_envelope("/api/v1/series", &[("match[]", selector.as_str())])
            .await?;
        let series: Vec<BTreeMap<String, String>> = serde_json::from_value(data)
            .map_err(|e| Error::Parse(format!("series response: {}", e)))?;

        let mut label_values: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for labelset in &series {
            for (label, value) in labelset {
                if label == "__name__" || label == service_label {
                    continue;
                }
                label_values.entry(label).or_default().insert(value);
            }
        }

        let mut labels: Vec<LabelInfo> = label_values
            .into_iter()
            .map(|(name, values)| LabelInfo {
                name: name.to_string(),
                unique_values: values.len() as i64,
                sample_values: values
                    .iter()
                    .take(sample_limit)
                    .map(|v| v.to_string())
                    .collect(),
            })
            .collect();
        labels.sort_by(|a, b| {
            b.unique_values
                .cmp(&a.unique_values)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(labels)
    }

    /// All known metric names via the label-values endpoint.
    pub async fn get_all_metric_names(&self) -> Result<Vec<String>> {
        let data = self
            .get_envelope("/api/v1/label/__name__/values", &[])
            .await?;
        serde_json::from_value(data).map_err(|e| Error::Parse(format!("metric names: {}", e)))
    }

    /// `count(<metric>)`; zero when the metric has no series.
    pub async fn get_metric_cardinality(&self, metric_name: &str) -> Result<i64> {
        let query = format!("count({})", metric_name);
        let data = self.query(&query).await?;
        Ok(data.result.first().map(parse::sample_value).unwrap_or(0))
    }

    /// Scrape interval from the runtime config endpoint. Any fetch or parse
    /// failure falls back to 15 s; this call never errors.
    pub async fn get_scrape_interval(&self) -> Duration {
        let data = match self.get_envelope("/api/v1/status/config", &[]).await {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "failed to fetch prometheus config, using default scrape interval");
                return DEFAULT_SCRAPE_INTERVAL;
            }
        };
        data.get("yaml")
            .and_then(|y| y.as_str())
            .and_then(scrape_interval_from_yaml)
            .unwrap_or(DEFAULT_SCRAPE_INTERVAL)
    }

    async fn query(&self, promql: &str) -> Result<parse::QueryData> {
        let data = self.get_envelope("/api/v1/query", &[("query", promql)]).await?;
        let parsed: parse::QueryData = serde_json::from_value(data)
            .map_err(|e| Error::Parse(format!("query result: {}", e)))?;
        if !parsed.result_type.is_empty() && parsed.result_type != "vector" {
            return Err(Error::Parse(format!(
                "unexpected result type: {}",
                parsed.result_type
            )));
        }
        Ok(parsed)
    }

    /// GET with retry, then unwrap the `{status, data, error}` envelope.
    /// An error envelope counts as a failed attempt and is retried.
    async fn get_envelope(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value> {
        let mut last_err: Option<Error> = None;
        for attempt in 1..=self.retry.max_attempts {
            let backoff = self.retry.backoff(attempt);
            if !backoff.is_zero() {
                debug!(attempt, backoff_ms = backoff.as_millis() as u64, "retrying request");
                tokio::time::sleep(backoff).await;
            }

            match self.get_envelope_once(path, query).await {
                Ok(data) => return Ok(data),
                Err(e) => {
                    debug!(attempt, error = %e, path, "request failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::BackendUnavailable("no attempts made".into())))
    }

    async fn get_envelope_once(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value> {
        let body = self.get_raw(path, query).await?;
        let envelope: parse::ApiResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::Parse(format!("response envelope: {}", e)))?;
        if envelope.status != "success" {
            return Err(Error::Backend(envelope.error));
        }
        Ok(envelope.data)
    }

    async fn get_raw(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<u8>> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.get(&url);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            req = req.basic_auth(user, Some(pass));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::BackendUnavailable(format!("request failed: {}", e)))?;
        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::BackendUnavailable(format!("failed to read response: {}", e)))?;
        if !status.is_success() {
            return Err(Error::BackendUnavailable(format!(
                "unexpected status code {}: {}",
                status.as_u16(),
                String::from_utf8_lossy(&body)
            )));
        }
        Ok(body.to_vec())
    }
}

/// Pulls `scrape_interval: <n>s|m` out of the global section of the config
/// yaml. Good enough for the one field we need; anything else defaults.
fn scrape_interval_from_yaml(yaml: &str) -> Option<Duration> {
    for line in yaml.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("scrape_interval:") {
            let v = rest.trim();
            if let Some(secs) = v.strip_suffix('s').and_then(|n| n.parse::<u64>().ok()) {
                return Some(Duration::from_secs(secs));
            }
            if let Some(mins) = v.strip_suffix('m').and_then(|n| n.parse::<u64>().ok()) {
                return Some(Duration::from_secs(mins * 60));
            }
        }
    }
    None
}
