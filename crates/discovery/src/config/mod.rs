//! JSON configuration with environment overrides

mod loader;
mod types;

pub use loader::{
    ConfigError, ENV_PREFIX, KNOWN_SOURCES, load_config, load_config_from_str, load_default_config,
};
pub use types::{DiscoveryConfig, GlobalConfig, PersistenceConfig, SourceConfig};
