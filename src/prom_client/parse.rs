// Prometheus JSON envelope and defensive scalar parsing.
// Envelope access stays in prom_client::mod; only shapes and helpers here.

use serde::Deserialize;
use std::collections::HashMap;

/// Top-level envelope: `{status, data, error}`.
#[derive(Debug, Deserialize)]
pub(super) struct ApiResponse {
    pub status: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub error: String,
}

/// `data` shape for instant queries.
#[derive(Debug, Deserialize)]
pub(super) struct QueryData {
    #[serde(rename = "resultType", default)]
    pub result_type: String,
    #[serde(default)]
    pub result: Vec<QuerySample>,
}

/// One vector sample: labelset plus a `[ts, "value"]` pair.
#[derive(Debug, Deserialize)]
pub(super) struct QuerySample {
    #[serde(default)]
    pub metric: HashMap<String, String>,
    #[serde(default)]
    pub value: Vec<serde_json::Value>,
}

/// Prometheus returns numeric scalars as strings; older proxies have been
/// seen returning plain numbers. Accept both, and scan leading digits as a
/// last resort.
pub(super) fn parse_scalar(value: &serde_json::Value) -> i64 {
    if let Some(n) = value.as_i64() {
        return n;
    }
    if let Some(f) = value.as_f64() {
        return f as i64;
    }
    if let Some(s) = value.as_str() {
        let s = s.trim();
        if let Ok(n) = s.parse::<i64>() {
            return n;
        }
        if let Ok(f) = s.parse::<f64>() {
            return f as i64;
        }
        let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(n) = digits.parse::<i64>() {
            return n;
        }
    }
    0
}

/// Extracts the scalar out of a query sample's `[ts, value]` pair.
pub(super) fn sample_value(sample: &QuerySample) -> i64 {
    match sample.value.get(1) {
        Some(v) => parse_scalar(v),
        None => 0,
    }
}
