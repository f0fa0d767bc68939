//! Explicit connector registry

use log::info;
use statlas_core::SourceId;
use statlas_gateway::{
    AemetConnector, AemetDialect, ConnectorSettings, EurostatConnector, EurostatDialect,
    IneConnector, IneDialect, ReqwestSessionFactory,
};
use statlas_ports::{SessionFactory, SourceConnector};
use std::sync::Arc;

use crate::config::{ConfigError, DiscoveryConfig};
use crate::error::DiscoveryResult;

/// Connectors taking part in discovery, in registration order
///
/// Registration order is the merge order of a refresh: when two sources
/// report the same dataset id, the earlier source keeps the bare id.
#[derive(Default, Clone)]
pub struct ConnectorRegistry {
    connectors: Vec<Arc<dyn SourceConnector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connector, replacing one already registered for the same
    /// source (which keeps its position)
    pub fn register(
        &mut self,
        connector: Arc<dyn SourceConnector>,
    ) -> Option<Arc<dyn SourceConnector>> {
        let source = connector.source_id().clone();
        match self
            .connectors
            .iter_mut()
            .find(|c| c.source_id() == &source)
        {
            Some(slot) => Some(std::mem::replace(slot, connector)),
            None => {
                self.connectors.push(connector);
                None
            }
        }
    }

    /// Builder form of [`ConnectorRegistry::register`]
    pub fn with(mut self, connector: Arc<dyn SourceConnector>) -> Self {
        self.register(connector);
        self
    }

    pub fn get(&self, source: &str) -> Option<&Arc<dyn SourceConnector>> {
        let source = SourceId::new(source);
        self.connectors.iter().find(|c| c.source_id() == &source)
    }

    pub fn ids(&self) -> Vec<SourceId> {
        self.connectors
            .iter()
            .map(|c| c.source_id().clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SourceConnector>> {
        self.connectors.iter()
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    /// Built-in connectors for every enabled source, over reqwest sessions
    pub fn from_config(config: &DiscoveryConfig) -> DiscoveryResult<Self> {
        let factory = Arc::new(ReqwestSessionFactory::new(config.global.request_timeout()));
        Self::from_config_with_factory(config, factory)
    }

    /// Built-in connectors for every enabled source, over any session
    /// factory
    pub fn from_config_with_factory(
        config: &DiscoveryConfig,
        factory: Arc<dyn SessionFactory>,
    ) -> DiscoveryResult<Self> {
        config.validate()?;

        let mut registry = Self::new();
        for source in config.enabled_sources() {
            let settings = source.connector_settings(&config.global);
            let connector = builtin(&source.id, Arc::clone(&factory), settings)?;
            info!(
                "[DISCOVERY] registered {} ({} req/{}s)",
                connector.source_id(),
                connector.rate_limit(),
                config.global.rate_window_secs
            );
            registry.register(connector);
        }
        Ok(registry)
    }
}

/// Build one of the built-in connectors by source id
pub fn builtin(
    id: &str,
    factory: Arc<dyn SessionFactory>,
    settings: ConnectorSettings,
) -> DiscoveryResult<Arc<dyn SourceConnector>> {
    let connector: Arc<dyn SourceConnector> = match SourceId::new(id).as_str() {
        "ine" => Arc::new(IneConnector::new(IneDialect, factory, settings)?),
        "aemet" => Arc::new(AemetConnector::new(AemetDialect, factory, settings)?),
        "eurostat" => Arc::new(EurostatConnector::new(EurostatDialect, factory, settings)?),
        other => return Err(ConfigError::UnknownSource(other.to_string()).into()),
    };
    Ok(connector)
}
