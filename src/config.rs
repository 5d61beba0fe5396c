//! ==============================================================================
//! config.rs - runtime configuration loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `dashboard.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - ServerConfig: where the web server listens.
//!     - DatabaseConfig: postgres connection and telemetry table.
//!     - PollingConfig: how often and from where the dashboard fetches.
//!     - SeriesConfig / MetricPrecision: rolling window size, seeds, rounding.
//!     - FeatureFlags: charts, detection overlay, alerts.
//!     - AlertsConfig / DetectionConfig: collaborators behind the flags.
//!
//! every section has serde defaults, so a partial file is fine.
//!
//! ==============================================================================

use crate::alerts::AlertRule;
use crate::domain::Metric;
use crate::store;
use anyhow::{bail, Context};
use chrono::{FixedOffset, Local, Offset};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DashboardConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub polling: PollingConfig,
    pub series: SeriesConfig,
    pub precision: MetricPrecision,
    pub features: FeatureFlags,
    pub alerts: AlertsConfig,
    pub detection: DetectionConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:3000".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    /// libpq-style url; overridden by `DATABASE_URL`
    pub url: String,
    pub table: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://postgres@localhost/telemetry".to_string(),
            table: "temp_data".to_string(),
        }
    }
}

/// what to do when a tick fires while the previous fetch is still running
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OverlapPolicy {
    /// run anyway, drop responses older than the last applied one
    #[default]
    LatestWins,
    /// skip the tick
    SingleFlight,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub source_url: String,
    pub request_timeout_ms: u64,
    pub overlap: OverlapPolicy,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            source_url: "http://127.0.0.1:3000/api/get-newest-temp".to_string(),
            request_timeout_ms: 4_000,
            overlap: OverlapPolicy::LatestWins,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SeriesConfig {
    pub capacity: usize,
    pub seed: SeedConfig,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self { capacity: crate::series::DEFAULT_CAPACITY, seed: SeedConfig::default() }
    }
}

/// value each series starts with before the first fetch
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SeedConfig {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self { temperature: 30.0, humidity: 70.0, pressure: 1013.0 }
    }
}

/// decimal places kept per metric
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MetricPrecision {
    pub temperature: u32,
    pub humidity: u32,
    pub pressure: u32,
}

impl Default for MetricPrecision {
    fn default() -> Self {
        Self { temperature: 2, humidity: 2, pressure: 1 }
    }
}

impl MetricPrecision {
    pub fn for_metric(&self, metric: Metric) -> u32 {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Humidity => self.humidity,
            Metric::Pressure => self.pressure,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeatureFlags {
    pub enable_charts: bool,
    pub enable_detection: bool,
    pub enable_alerts: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self { enable_charts: true, enable_detection: false, enable_alerts: true }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    #[default]
    Log,
    Webhook,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AlertsConfig {
    pub notifier: NotifierKind,
    pub webhook_url: Option<String>,
    pub rules: Vec<AlertRule>,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            notifier: NotifierKind::Log,
            webhook_url: None,
            rules: AlertRule::defaults(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DetectionConfig {
    /// detection service accepting a POSTed image
    pub endpoint: Option<String>,
    /// boxes smaller than this (px²) are not drawn
    pub min_area: f64,
    pub max_area: Option<f64>,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            min_area: 0.0,
            max_area: None,
            canvas_width: 640,
            canvas_height: 480,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DisplayConfig {
    /// offset used for "last updated"; the host's local offset when unset
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_readings: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_readings: true }
    }
}

impl DashboardConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {}", path.as_ref().display()))?;

        let config: DashboardConfig = toml::from_str(&content).context("Failed to parse config")?;

        Ok(config)
    }

    /// Load with default fallback
    ///
    /// nothing is logged here: the subscriber is configured from the result.
    /// the returned note says where the config came from.
    pub fn load_or_default() -> (Self, String) {
        let mut paths = Vec::new();
        if let Ok(explicit) = std::env::var("DASHBOARD_CONFIG") {
            paths.push(PathBuf::from(explicit));
        }
        paths.push(PathBuf::from("config").join("dashboard.toml"));
        paths.push(PathBuf::from("..").join("config").join("dashboard.toml"));

        let mut failures = Vec::new();
        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => return (config, format!("Loaded from {}", path.display())),
                    Err(e) => failures.push(format!("{}: {:#}", path.display(), e)),
                }
            }
        }

        let note = if failures.is_empty() {
            "No config file found - using defaults".to_string()
        } else {
            format!("Using defaults, failed to load {}", failures.join("; "))
        };
        (Self::default(), note)
    }

    /// environment overrides the file
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                self.database.url = url;
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.polling.interval_ms == 0 {
            bail!("polling.interval_ms must be greater than zero");
        }
        if self.series.capacity == 0 {
            bail!("series.capacity must be greater than zero");
        }
        if !store::is_sql_identifier(&self.database.table) {
            bail!("database.table `{}` is not a plain SQL identifier", self.database.table);
        }
        if self.features.enable_alerts
            && self.alerts.notifier == NotifierKind::Webhook
            && self.alerts.webhook_url.as_deref().map_or(true, str::is_empty)
        {
            bail!("alerts.notifier = \"webhook\" needs alerts.webhook_url");
        }
        if self.features.enable_detection && self.detection.endpoint.as_deref().map_or(true, str::is_empty) {
            bail!("features.enable_detection needs detection.endpoint");
        }
        if let Some(max) = self.detection.max_area {
            if max < self.detection.min_area {
                bail!("detection.max_area is below detection.min_area");
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.polling.interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.polling.request_timeout_ms)
    }

    pub fn utc_offset(&self) -> FixedOffset {
        self.display
            .utc_offset_minutes
            .and_then(|m| FixedOffset::east_opt(m * 60))
            .unwrap_or_else(|| Local::now().offset().fix())
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        tracing::info!(
            bind = %self.server.bind,
            table = %self.database.table,
            interval_ms = self.polling.interval_ms,
            source = %self.polling.source_url,
            overlap = ?self.polling.overlap,
            "[CONFIG] server and polling"
        );
        tracing::info!(
            charts = self.features.enable_charts,
            detection = self.features.enable_detection,
            alerts = self.features.enable_alerts,
            rules = self.alerts.rules.len(),
            notifier = ?self.alerts.notifier,
            "[CONFIG] features"
        );
    }
}
