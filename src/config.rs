use serde::Deserialize;

use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::monitor::MonitorSettings;
use crate::poller::DEFAULT_POLL_INTERVAL;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub registry: RegistryConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Base url of the traffic/version registry API.
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Samples kept per version for trend sparklines.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Drop trend history for versions missing from two consecutive snapshots.
    #[serde(default)]
    pub evict_stale_versions: bool,
    /// Buffered notices per panel for WebSocket clients (slow clients may lag).
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Plugin ids mounted at startup.
    #[serde(default)]
    pub plugins: Vec<String>,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_event_capacity() -> usize {
    64
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            history_capacity: default_history_capacity(),
            evict_stale_versions: false,
            event_capacity: default_event_capacity(),
            plugins: Vec::new(),
        }
    }
}

impl MonitorConfig {
    pub fn settings(&self) -> MonitorSettings {
        MonitorSettings {
            poll_interval_ms: self.poll_interval_ms,
            history_capacity: self.history_capacity,
            evict_stale_versions: self.evict_stale_versions,
            event_capacity: self.event_capacity,
        }
    }
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
            !self.registry.base_url.is_empty(),
            "registry.base_url must be non-empty"
        );
        if let Err(e) = reqwest::Url::parse(&self.registry.base_url) {
            anyhow::bail!(
                "registry.base_url must be a valid url, got {:?}: {}",
                self.registry.base_url,
                e
            );
        }
        anyhow::ensure!(
            self.registry.request_timeout_ms > 0,
            "registry.request_timeout_ms must be > 0, got {}",
            self.registry.request_timeout_ms
        );
        anyhow::ensure!(
            self.monitor.poll_interval_ms > 0,
            "monitor.poll_interval_ms must be > 0, got {}",
            self.monitor.poll_interval_ms
        );
        anyhow::ensure!(
            self.monitor.history_capacity > 0,
            "monitor.history_capacity must be > 0, got {}",
            self.monitor.history_capacity
        );
        anyhow::ensure!(
            self.monitor.event_capacity > 0,
            "monitor.event_capacity must be > 0, got {}",
            self.monitor.event_capacity
        );
        anyhow::ensure!(
            self.monitor.plugins.iter().all(|p| !p.trim().is_empty()),
            "monitor.plugins must not contain empty plugin ids"
        );
        Ok(())
    }
}
