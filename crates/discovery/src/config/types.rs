use serde::{Deserialize, Serialize};
use statlas_gateway::ConnectorSettings;
use std::time::Duration;

/// Root configuration for discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// Configuration for a single statistics source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Built-in source identifier ("ine", "aemet", "eurostat")
    pub id: String,
    /// Whether this source takes part in discovery
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// REST API base URL; the source's public endpoint when absent
    #[serde(default)]
    pub base_url: Option<String>,
    /// Requests per rate window; the source's documented ceiling when absent
    #[serde(default)]
    pub rate_limit: Option<u32>,
}

impl SourceConfig {
    pub fn new(id: impl Into<String>) -> Self {
        SourceConfig {
            id: id.into(),
            enabled: true,
            base_url: None,
            rate_limit: None,
        }
    }

    /// Connector settings for this source under the global knobs
    pub fn connector_settings(&self, global: &GlobalConfig) -> ConnectorSettings {
        ConnectorSettings {
            base_url: self.base_url.clone(),
            rate_limit: self.rate_limit,
            rate_window: global.rate_window(),
            cache_ttl: global.cache_ttl(),
            cache_capacity: global.cache_capacity,
        }
    }
}

/// Knobs shared by every source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Lifetime of a cached response in seconds
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// Cached responses kept per connector
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Length of the rate limiting window in seconds
    #[serde(default = "default_rate_window")]
    pub rate_window_secs: u64,
    /// Upper bound for one connector's part of a refresh
    #[serde(default = "default_connector_timeout")]
    pub connector_timeout_secs: u64,
    /// Timeout of a single HTTP request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Drop entries a source no longer reports
    #[serde(default = "default_true")]
    pub prune_missing: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        GlobalConfig {
            cache_ttl_secs: default_cache_ttl(),
            cache_capacity: default_cache_capacity(),
            rate_window_secs: default_rate_window(),
            connector_timeout_secs: default_connector_timeout(),
            request_timeout_secs: default_request_timeout(),
            prune_missing: true,
        }
    }
}

impl GlobalConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }

    pub fn connector_timeout(&self) -> Duration {
        Duration::from_secs(self.connector_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Catalog persistence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub enabled: bool,
    /// `memory://`, `file://<path>.json`, `sqlite://<path>` or `sqlite::memory:`
    #[serde(default)]
    pub connection: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_cache_capacity() -> usize {
    100
}

fn default_rate_window() -> u64 {
    60
}

fn default_connector_timeout() -> u64 {
    120
}

fn default_request_timeout() -> u64 {
    30
}
