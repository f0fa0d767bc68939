use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use super::types::{DiscoveryConfig, SourceConfig};

/// Sources the registry knows how to build
pub const KNOWN_SOURCES: &[&str] = &["ine", "aemet", "eurostat"];

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "STATLAS_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("No enabled sources in config")]
    NoEnabledSources,
    #[error("Unknown source: {0}")]
    UnknownSource(String),
    #[error("Source configured twice: {0}")]
    DuplicateSource(String),
    #[error("Invalid configuration: {0}")]
    Validation(String),
    #[error("Invalid value for {key}: '{value}'")]
    InvalidOverride { key: String, value: String },
}

/// Load discovery configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<DiscoveryConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: DiscoveryConfig = serde_json::from_str(&content)?;
    Ok(config)
}

/// Load configuration from a JSON string
pub fn load_config_from_str(json: &str) -> Result<DiscoveryConfig, ConfigError> {
    let config: DiscoveryConfig = serde_json::from_str(json)?;
    Ok(config)
}

/// Load the default embedded configuration
pub fn load_default_config() -> Result<DiscoveryConfig, ConfigError> {
    let default_config = include_str!("default_config.json");
    load_config_from_str(default_config)
}

fn parse_override<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidOverride {
            key: key.to_string(),
            value: value.to_string(),
        })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidOverride {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

impl DiscoveryConfig {
    /// Get only enabled sources
    pub fn enabled_sources(&self) -> Vec<&SourceConfig> {
        self.sources.iter().filter(|s| s.enabled).collect()
    }

    /// Get a specific source by ID
    pub fn get_source(&self, id: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.id.eq_ignore_ascii_case(id))
    }

    /// Apply `STATLAS_*` variables from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(std::env::vars())
    }

    /// Apply overrides from `(key, value)` pairs
    ///
    /// Recognised keys: `STATLAS_CACHE_TTL_SECS`,
    /// `STATLAS_CONNECTOR_TIMEOUT_SECS`, `STATLAS_PERSISTENCE_ENABLED`,
    /// `STATLAS_PERSISTENCE_URL` and `STATLAS_RATE_LIMIT_<SOURCE>`. Other
    /// keys are ignored.
    pub fn apply_overrides<I, K, V>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let (key, value) = (key.as_ref(), value.as_ref());
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };

            match name {
                "CACHE_TTL_SECS" => self.global.cache_ttl_secs = parse_override(key, value)?,
                "CONNECTOR_TIMEOUT_SECS" => {
                    self.global.connector_timeout_secs = parse_override(key, value)?
                }
                "PERSISTENCE_ENABLED" => self.persistence.enabled = parse_flag(key, value)?,
                "PERSISTENCE_URL" => {
                    self.persistence.connection = Some(value.trim().to_string())
                }
                _ => {
                    let Some(source) = name.strip_prefix("RATE_LIMIT_") else {
                        continue;
                    };
                    let limit: u32 = parse_override(key, value)?;
                    let id = source.to_lowercase();
                    match self.sources.iter_mut().find(|s| s.id.eq_ignore_ascii_case(&id)) {
                        Some(config) => config.rate_limit = Some(limit),
                        None => return Err(ConfigError::UnknownSource(id)),
                    }
                }
            }
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled_sources().is_empty() {
            return Err(ConfigError::NoEnabledSources);
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            let id = source.id.trim().to_lowercase();
            if !KNOWN_SOURCES.contains(&id.as_str()) {
                return Err(ConfigError::UnknownSource(source.id.clone()));
            }
            if !seen.insert(id) {
                return Err(ConfigError::DuplicateSource(source.id.clone()));
            }
            if source.rate_limit == Some(0) {
                return Err(ConfigError::Validation(format!(
                    "rate_limit of {} must be positive",
                    source.id
                )));
            }
        }

        let global = &self.global;
        if global.cache_ttl_secs == 0 {
            return Err(ConfigError::Validation("cache_ttl_secs must be positive".into()));
        }
        if global.rate_window_secs == 0 {
            return Err(ConfigError::Validation("rate_window_secs must be positive".into()));
        }
        if global.connector_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "connector_timeout_secs must be positive".into(),
            ));
        }

        if self.persistence.enabled
            && self
                .persistence
                .connection
                .as_deref()
                .is_none_or(|c| c.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "persistence is enabled but no connection is configured".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_default_config() {
        let config = load_default_config().unwrap();
        assert_eq!(config.sources.len(), 3);
        assert!(config.validate().is_ok());
        assert_eq!(config.global.cache_ttl_secs, 3600);
        assert!(!config.persistence.enabled);
    }

    #[test]
    fn test_get_source() {
        let config = load_default_config().unwrap();
        let ine = config.get_source("INE").unwrap();
        assert_eq!(ine.rate_limit, Some(100));
        assert!(config.get_source("ons").is_none());
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = load_config_from_str(r#"{"sources":[{"id":"aemet"}]}"#).unwrap();
        let aemet = &config.sources[0];
        assert!(aemet.enabled);
        assert!(aemet.base_url.is_none());
        assert_eq!(config.global.connector_timeout_secs, 120);
        assert!(config.global.prune_missing);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let disabled =
            load_config_from_str(r#"{"sources":[{"id":"ine","enabled":false}]}"#).unwrap();
        assert!(matches!(disabled.validate(), Err(ConfigError::NoEnabledSources)));

        let unknown = load_config_from_str(r#"{"sources":[{"id":"ons"}]}"#).unwrap();
        assert!(matches!(unknown.validate(), Err(ConfigError::UnknownSource(_))));

        let twice = load_config_from_str(r#"{"sources":[{"id":"ine"},{"id":"INE"}]}"#).unwrap();
        assert!(matches!(twice.validate(), Err(ConfigError::DuplicateSource(_))));

        let zero = load_config_from_str(r#"{"sources":[{"id":"ine","rate_limit":0}]}"#).unwrap();
        assert!(matches!(zero.validate(), Err(ConfigError::Validation(_))));

        let no_url = load_config_from_str(
            r#"{"sources":[{"id":"ine"}],"persistence":{"enabled":true}}"#,
        )
        .unwrap();
        assert!(matches!(no_url.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_overrides() {
        let mut config = load_default_config().unwrap();
        config
            .apply_overrides([
                ("STATLAS_CACHE_TTL_SECS", "60"),
                ("STATLAS_RATE_LIMIT_EUROSTAT", "5"),
                ("STATLAS_PERSISTENCE_ENABLED", "true"),
                ("STATLAS_PERSISTENCE_URL", "memory://"),
                ("HOME", "/root"),
            ])
            .unwrap();

        assert_eq!(config.global.cache_ttl_secs, 60);
        assert_eq!(config.get_source("eurostat").unwrap().rate_limit, Some(5));
        assert!(config.persistence.enabled);
        assert_eq!(config.persistence.connection.as_deref(), Some("memory://"));
    }

    #[test]
    fn test_malformed_override_is_rejected() {
        let mut config = load_default_config().unwrap();
        let err = config
            .apply_overrides([("STATLAS_CONNECTOR_TIMEOUT_SECS", "soon")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOverride { .. }));

        assert!(matches!(
            config.apply_overrides([("STATLAS_RATE_LIMIT_ONS", "10")]),
            Err(ConfigError::UnknownSource(_))
        ));
        assert!(matches!(
            config.apply_overrides([("STATLAS_PERSISTENCE_ENABLED", "maybe")]),
            Err(ConfigError::InvalidOverride { .. })
        ));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statlas.json");
        std::fs::write(&path, r#"{"sources":[{"id":"eurostat","rate_limit":2}]}"#).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.sources[0].rate_limit, Some(2));
        assert!(matches!(
            load_config(dir.path().join("missing.json")),
            Err(ConfigError::IoError(_))
        ));
    }
}
