use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub prometheus: PrometheusConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    pub scan: ScanConfig,
    pub storage: StorageConfig,
    /// Optional; the analyzer is disabled when absent.
    pub gemini: Option<GeminiConfig>,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrometheusConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_prometheus_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_prometheus_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// Label whose values identify a service (e.g. "service", "job", "app").
    #[serde(default = "default_service_label")]
    pub service_label: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            service_label: default_service_label(),
        }
    }
}

fn default_service_label() -> String {
    "service".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    pub interval_secs: u64,
    #[serde(default = "default_sample_values_limit")]
    pub sample_values_limit: usize,
    /// Concurrent per-service scans. 1 is serial.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Skip label fetches for metrics above this series count. 0 disables the bypass.
    #[serde(default = "default_label_fetch_threshold")]
    pub label_fetch_threshold: i64,
}

fn default_sample_values_limit() -> usize {
    10
}

fn default_concurrency() -> usize {
    5
}

fn default_label_fetch_threshold() -> i64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub path: String,
    /// Snapshots older than this many days are deleted after each scan. 0 disables cleanup.
    #[serde(default)]
    pub retention_days: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_temperature")]
    pub temperature: f32,
    #[serde(default = "default_gemini_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_gemini_model() -> String {
    "gemini-2.5-pro".into()
}

fn default_gemini_temperature() -> f32 {
    0.2
}

fn default_gemini_max_output_tokens() -> u32 {
    8192
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.prometheus.url.is_empty(),
            "prometheus.url must be non-empty"
        );
        anyhow::ensure!(
            self.prometheus.timeout_secs > 0,
            "prometheus.timeout_secs must be > 0, got {}",
            self.prometheus.timeout_secs
        );
        anyhow::ensure!(
            !self.discovery.service_label.is_empty(),
            "discovery.service_label must be non-empty"
        );
        anyhow::ensure!(
            self.scan.interval_secs > 0,
            "scan.interval_secs must be > 0, got {}",
            self.scan.interval_secs
        );
        anyhow::ensure!(
            self.scan.sample_values_limit > 0,
            "scan.sample_values_limit must be > 0, got {}",
            self.scan.sample_values_limit
        );
        anyhow::ensure!(
            self.scan.concurrency > 0,
            "scan.concurrency must be > 0, got {}",
            self.scan.concurrency
        );
        anyhow::ensure!(
            self.scan.label_fetch_threshold >= 0,
            "scan.label_fetch_threshold must be >= 0, got {}",
            self.scan.label_fetch_threshold
        );
        anyhow::ensure!(!self.storage.path.is_empty(), "storage.path must be non-empty");
        if let Some(gemini) = &self.gemini {
            anyhow::ensure!(!gemini.api_key.is_empty(), "gemini.api_key must be non-empty");
            anyhow::ensure!(!gemini.model.is_empty(), "gemini.model must be non-empty");
            anyhow::ensure!(
                (0.0..=2.0).contains(&gemini.temperature),
                "gemini.temperature must be between 0.0 and 2.0, got {}",
                gemini.temperature
            );
            anyhow::ensure!(
                gemini.max_output_tokens > 0,
                "gemini.max_output_tokens must be > 0, got {}",
                gemini.max_output_tokens
            );
        }
        Ok(())
    }
}
