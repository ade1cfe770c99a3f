// Config loading and validation tests

use metricscope::config::AppConfig;

const VALID_CONFIG: &str = r#"
[server]
port = 8080
host = "0.0.0.0"

[prometheus]
url = "http://localhost:9090"
timeout_secs = 15

[discovery]
service_label = "service"

[scan]
interval_secs = 3600
sample_values_limit = 10
concurrency = 5
label_fetch_threshold = 10000

[storage]
path = "data/metricscope.db"
retention_days = 30

[gemini]
api_key = "test-key"
model = "gemini-2.5-pro"
temperature = 0.2
max_output_tokens = 8192
"#;

#[test]
fn config_loads_from_str() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.prometheus.url, "http://localhost:9090");
    assert_eq!(config.prometheus.timeout_secs, 15);
    assert_eq!(config.discovery.service_label, "service");
    assert_eq!(config.scan.interval_secs, 3600);
    assert_eq!(config.scan.sample_values_limit, 10);
    assert_eq!(config.scan.concurrency, 5);
    assert_eq!(config.storage.retention_days, 30);
    let gemini = config.gemini.expect("gemini section");
    assert_eq!(gemini.model, "gemini-2.5-pro");
}

#[test]
fn config_defaults_apply_when_keys_omitted() {
    let minimal = r#"
[server]
port = 8080
host = "127.0.0.1"

[prometheus]
url = "http://localhost:9090"

[scan]
interval_secs = 60

[storage]
path = "data/db.sqlite"
"#;
    let config = AppConfig::load_from_str(minimal).expect("load_from_str");
    assert_eq!(config.prometheus.timeout_secs, 30);
    assert_eq!(config.discovery.service_label, "service");
    assert_eq!(config.scan.sample_values_limit, 10);
    assert_eq!(config.scan.concurrency, 5);
    assert_eq!(config.scan.label_fetch_threshold, 10_000);
    assert_eq!(config.storage.retention_days, 0);
    assert!(config.gemini.is_none());
    assert_eq!(config.log.level, "info");
}

#[test]
fn config_validation_rejects_invalid_port() {
    let bad = VALID_CONFIG.replace("port = 8080", "port = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("server.port"));
}

#[test]
fn config_validation_rejects_empty_prometheus_url() {
    let bad = VALID_CONFIG.replace("url = \"http://localhost:9090\"", "url = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("prometheus.url"));
}

#[test]
fn config_validation_rejects_zero_interval() {
    let bad = VALID_CONFIG.replace("interval_secs = 3600", "interval_secs = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("scan.interval_secs"));
}

#[test]
fn config_validation_rejects_zero_sample_limit() {
    let bad = VALID_CONFIG.replace("sample_values_limit = 10", "sample_values_limit = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("scan.sample_values_limit"));
}

#[test]
fn config_validation_rejects_zero_concurrency() {
    let bad = VALID_CONFIG.replace("concurrency = 5", "concurrency = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("scan.concurrency"));
}

#[test]
fn config_validation_rejects_empty_storage_path() {
    let bad = VALID_CONFIG.replace("path = \"data/metricscope.db\"", "path = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("storage.path"));
}

#[test]
fn config_validation_rejects_out_of_range_temperature() {
    let bad = VALID_CONFIG.replace("temperature = 0.2", "temperature = 3.5");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("gemini.temperature"));
}

#[test]
fn config_validation_rejects_empty_gemini_api_key() {
    let bad = VALID_CONFIG.replace("api_key = \"test-key\"", "api_key = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("gemini.api_key"));
}
