use std::collections::BTreeMap;

use serde::Deserialize;

use crate::aggregator::{DEFAULT_MINUTE_FORMAT, DEFAULT_RECORD_CAPACITY, MAX_ROUND_DECIMALS};
use crate::buffer::DEFAULT_LABEL_FORMAT;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub publishing: PublishingConfig,
    #[serde(default)]
    pub dashboards: Vec<DashboardConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishingConfig {
    /// Finalized records kept per dashboard in the broadcast channel for /ws (slow clients may lag).
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
    #[serde(default = "default_ws_ping_interval_secs")]
    pub ws_ping_interval_secs: u64,
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: default_broadcast_capacity(),
            ws_ping_interval_secs: default_ws_ping_interval_secs(),
        }
    }
}

fn default_broadcast_capacity() -> usize {
    64
}

fn default_ws_ping_interval_secs() -> u64 {
    30
}

/// One activity dashboard: its backend endpoints, metrics and window sizes.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    pub name: String,
    pub base_url: String,
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
    #[serde(default = "default_history_path")]
    pub history_path: String,
    #[serde(default = "default_clear_path")]
    pub clear_path: String,
    /// Snapshot fields sampled on every poll; dotted paths reach nested objects.
    pub metrics: Vec<String>,
    /// Backend history key stems per metric, e.g. `temperature = ["temp"]`.
    #[serde(default)]
    pub history_aliases: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    #[serde(default = "default_history_interval_secs")]
    pub history_interval_secs: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Real-time chart window (points).
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Minute records kept per metric.
    #[serde(default = "default_record_capacity")]
    pub record_capacity: usize,
    /// History chart width (points).
    #[serde(default = "default_max_history_points")]
    pub max_history_points: usize,
    #[serde(default = "default_label_format")]
    pub label_format: String,
    #[serde(default = "default_minute_format")]
    pub minute_format: String,
    /// Decimals kept in minute averages and peaks.
    #[serde(default = "default_round_decimals")]
    pub round_decimals: u32,
}

fn default_snapshot_path() -> String {
    "/sensor".into()
}

fn default_history_path() -> String {
    "/history".into()
}

fn default_clear_path() -> String {
    "/clear_history".into()
}

fn default_sample_interval_ms() -> u64 {
    5000
}

fn default_history_interval_secs() -> u64 {
    60
}

fn default_request_timeout_ms() -> u64 {
    4000
}

fn default_buffer_capacity() -> usize {
    10
}

fn default_record_capacity() -> usize {
    DEFAULT_RECORD_CAPACITY
}

fn default_max_history_points() -> usize {
    1440
}

fn default_label_format() -> String {
    DEFAULT_LABEL_FORMAT.into()
}

fn default_minute_format() -> String {
    DEFAULT_MINUTE_FORMAT.into()
}

fn default_round_decimals() -> u32 {
    1
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

    pub fn dashboard(&self, name: &str) -> Option<&DashboardConfig> {
        self.dashboards.iter().find(|d| d.name == name)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            self.publishing.broadcast_capacity > 0,
            "publishing.broadcast_capacity must be > 0, got {}",
            self.publishing.broadcast_capacity
        );
        anyhow::ensure!(
            self.publishing.ws_ping_interval_secs > 0,
            "publishing.ws_ping_interval_secs must be > 0, got {}",
            self.publishing.ws_ping_interval_secs
        );
        anyhow::ensure!(
            !self.dashboards.is_empty(),
            "at least one [[dashboards]] entry is required"
        );
        for (i, d) in self.dashboards.iter().enumerate() {
            anyhow::ensure!(
                !d.name.is_empty(),
                "dashboards[{}].name must be non-empty",
                i
            );
            anyhow::ensure!(
                self.dashboards.iter().filter(|o| o.name == d.name).count() == 1,
                "dashboards[{}].name {:?} is not unique",
                i,
                d.name
            );
            anyhow::ensure!(
                d.base_url.starts_with("http://") || d.base_url.starts_with("https://"),
                "dashboards[{}].base_url must be an http(s) URL, got {:?}",
                i,
                d.base_url
            );
            anyhow::ensure!(
                !d.metrics.is_empty(),
                "dashboards[{}].metrics must be non-empty",
                i
            );
            anyhow::ensure!(
                d.sample_interval_ms > 0,
                "dashboards[{}].sample_interval_ms must be > 0, got {}",
                i,
                d.sample_interval_ms
            );
            anyhow::ensure!(
                d.history_interval_secs > 0,
                "dashboards[{}].history_interval_secs must be > 0, got {}",
                i,
                d.history_interval_secs
            );
            anyhow::ensure!(
                d.request_timeout_ms > 0,
                "dashboards[{}].request_timeout_ms must be > 0, got {}",
                i,
                d.request_timeout_ms
            );
            anyhow::ensure!(
                d.buffer_capacity > 0,
                "dashboards[{}].buffer_capacity must be > 0, got {}",
                i,
                d.buffer_capacity
            );
            anyhow::ensure!(
                d.record_capacity > 0,
                "dashboards[{}].record_capacity must be > 0, got {}",
                i,
                d.record_capacity
            );
            anyhow::ensure!(
                d.max_history_points > 0,
                "dashboards[{}].max_history_points must be > 0, got {}",
                i,
                d.max_history_points
            );
            anyhow::ensure!(
                !d.minute_format.is_empty(),
                "dashboards[{}].minute_format must be non-empty",
                i
            );
            anyhow::ensure!(
                d.round_decimals <= MAX_ROUND_DECIMALS,
                "dashboards[{}].round_decimals must be <= {}, got {}",
                i,
                MAX_ROUND_DECIMALS,
                d.round_decimals
            );
        }
        Ok(())
    }
}
