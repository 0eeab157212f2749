use serde::Deserialize;

use crate::series::{SeriesCodes, default_series_codes};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub prometheus: PrometheusConfig,
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub charts: ChartsConfig,
    pub publishing: PublishingConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrometheusConfig {
    pub url: String,
    #[serde(default = "default_metric")]
    pub metric: String,
    /// Label carrying the instance id in the metrics store.
    #[serde(default = "default_entity_label")]
    pub entity_label: String,
}

fn default_metric() -> String {
    "flux_http_total".into()
}

fn default_entity_label() -> String {
    "individual".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryConfig {
    pub url: String,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

fn default_refresh_interval_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartsConfig {
    /// Poll slot width; also the rate window and the query step.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Initial fetch window and retention of every chart buffer.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_series_codes")]
    pub series: Vec<SeriesCodes>,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            window_secs: default_window_secs(),
            series: default_series_codes(),
        }
    }
}

fn default_interval_secs() -> u64 {
    15
}

fn default_window_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishingConfig {
    /// Max number of fleet updates kept in the broadcast channel for /ws/fleet (slow clients may lag).
    pub broadcast_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// How often to log app stats (chart subscriptions, fleet clients, refreshes) at INFO level.
    pub stats_log_interval_secs: u64,
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
            self.prometheus.url.starts_with("http://") || self.prometheus.url.starts_with("https://"),
            "prometheus.url must be an http(s) URL, got {:?}",
            self.prometheus.url
        );
        anyhow::ensure!(
            !self.prometheus.metric.is_empty(),
            "prometheus.metric must be non-empty"
        );
        anyhow::ensure!(
            !self.prometheus.entity_label.is_empty(),
            "prometheus.entity_label must be non-empty"
        );
        anyhow::ensure!(
            self.inventory.url.starts_with("http://") || self.inventory.url.starts_with("https://"),
            "inventory.url must be an http(s) URL, got {:?}",
            self.inventory.url
        );
        anyhow::ensure!(
            self.inventory.refresh_interval_secs > 0,
            "inventory.refresh_interval_secs must be > 0, got {}",
            self.inventory.refresh_interval_secs
        );
        anyhow::ensure!(
            self.charts.interval_secs > 0,
            "charts.interval_secs must be > 0, got {}",
            self.charts.interval_secs
        );
        anyhow::ensure!(
            self.charts.window_secs >= self.charts.interval_secs,
            "charts.window_secs must be >= charts.interval_secs, got {}",
            self.charts.window_secs
        );
        anyhow::ensure!(
            !self.charts.series.is_empty(),
            "charts.series must name at least one series"
        );
        for s in &self.charts.series {
            anyhow::ensure!(
                !s.name.is_empty() && !s.codes.is_empty(),
                "charts.series entries need a name and at least one code, got {:?}",
                s
            );
        }
        anyhow::ensure!(
            self.publishing.broadcast_capacity > 0,
            "publishing.broadcast_capacity must be > 0, got {}",
            self.publishing.broadcast_capacity
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        Ok(())
    }
}
