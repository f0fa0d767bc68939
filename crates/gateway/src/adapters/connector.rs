//! Generic connector: one fetcher plus a source dialect

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use serde_json::Value;
use statlas_core::{DatasetMetadata, FieldSchema, SeriesQuery, SeriesRecord, SourceId};
use statlas_ports::{
    ConnectorError, FetchError, FetchStats, SessionFactory, SourceConnector,
};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::dialect::{RawDataset, SourceDialect, SourceRequest, series_fields};
use super::parse;
use crate::error::GatewayError;
use crate::fetcher::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL, DEFAULT_RATE_WINDOW, FetcherConfig, QueryParams,
    RateLimitedFetcher,
};

/// Per-connector overrides of the dialect defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorSettings {
    pub base_url: Option<String>,
    /// Requests per `rate_window`; the dialect's ceiling when `None`
    pub rate_limit: Option<u32>,
    pub rate_window: Duration,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            rate_limit: None,
            rate_window: DEFAULT_RATE_WINDOW,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// [`SourceConnector`] over a [`SourceDialect`]
///
/// The dialect knows endpoint shapes and payload mapping; this type owns the
/// fetcher (session, cache, rate limiter) and applies the shared failure
/// policy:
///
/// | operation | on fetch failure |
/// |---|---|
/// | `get_metadata` | dialect fallback payload |
/// | `get_dataset_schema` | empty schema payload |
/// | `convert_to_standard_metadata` | `Err` (listing) / dataset skipped (entry) |
/// | `search_datasets`, `get_dataset_data` | empty result |
pub struct StatisticsConnector<D: SourceDialect> {
    dialect: D,
    source: SourceId,
    /// Upper-case source id used as log tag
    tag: String,
    fetcher: RateLimitedFetcher,
}

impl<D: SourceDialect> StatisticsConnector<D> {
    pub fn new(
        dialect: D,
        factory: Arc<dyn SessionFactory>,
        settings: ConnectorSettings,
    ) -> Result<Self, GatewayError> {
        let source = dialect.source_id();

        let raw_base = settings
            .base_url
            .as_deref()
            .unwrap_or_else(|| dialect.default_base_url());
        let base_url = Url::parse(raw_base).map_err(|e| GatewayError::InvalidBaseUrl {
            source_id: source.to_string(),
            reason: e.to_string(),
        })?;

        let rate_limit = settings
            .rate_limit
            .unwrap_or_else(|| dialect.default_rate_limit());
        if rate_limit == 0 {
            return Err(GatewayError::InvalidRateLimit(source.to_string()));
        }

        let tag = source.as_str().to_uppercase();
        let fetcher = RateLimitedFetcher::new(
            tag.clone(),
            base_url,
            factory,
            FetcherConfig {
                rate_limit,
                rate_window: settings.rate_window,
                cache_ttl: settings.cache_ttl,
                cache_capacity: settings.cache_capacity,
            },
        );

        Ok(Self {
            dialect,
            source,
            tag,
            fetcher,
        })
    }

    /// Connector with the dialect's base URL and rate limit
    pub fn with_defaults(
        dialect: D,
        factory: Arc<dyn SessionFactory>,
    ) -> Result<Self, GatewayError> {
        Self::new(dialect, factory, ConnectorSettings::default())
    }

    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    pub fn fetcher(&self) -> &RateLimitedFetcher {
        &self.fetcher
    }

    pub fn base_url(&self) -> &Url {
        self.fetcher.base_url()
    }

    pub(crate) async fn send(&self, request: &SourceRequest) -> Result<Value, FetchError> {
        self.fetcher
            .try_fetch(&request.endpoint, &request.params)
            .await
    }

    /// Canonical metadata for one listing entry
    fn normalize(
        &self,
        raw: RawDataset,
        fields: Vec<FieldSchema>,
    ) -> Result<DatasetMetadata, ConnectorError> {
        let endpoint = match &raw.endpoint {
            Some(absolute) => Url::parse(absolute).map_err(|e| e.to_string()),
            None => self
                .fetcher
                .endpoint_url(&self.dialect.dataset_path(&raw.id), &QueryParams::new())
                .map_err(|e| e.to_string()),
        }
        .map_err(|e| ConnectorError::Normalization {
            dataset_id: raw.id.clone(),
            reason: format!("invalid endpoint: {}", e),
        })?;

        let last_updated = raw
            .last_updated
            .as_ref()
            .and_then(parse::timestamp)
            .unwrap_or_else(Utc::now);

        let mut tags = raw.tags;
        for implied in self.dialect.implied_tags(&raw.id) {
            if !tags.contains(&implied) {
                tags.push(implied);
            }
        }

        let mut metadata = DatasetMetadata::new(raw.id, raw.name, self.source.clone(), endpoint)
            .with_schema(fields)
            .with_tags(tags)
            .with_last_updated(last_updated)
            .with_rate_limit(self.fetcher.rate_limit());

        if let Some(frequency) = raw.update_frequency {
            metadata = metadata.with_update_frequency(frequency);
        }
        if let Some(description) = raw.description {
            metadata = metadata.with_description(description);
        }
        if let Some(license) = raw.license {
            metadata = metadata.with_license(license);
        }

        metadata
            .validate()
            .map_err(|e| ConnectorError::Normalization {
                dataset_id: metadata.id.clone(),
                reason: e.to_string(),
            })?;

        Ok(metadata)
    }
}

#[async_trait]
impl<D: SourceDialect> SourceConnector for StatisticsConnector<D> {
    fn source_id(&self) -> &SourceId {
        &self.source
    }

    fn rate_limit(&self) -> u32 {
        self.fetcher.rate_limit()
    }

    fn open_session(&self) -> Result<(), FetchError> {
        self.fetcher.open_session()
    }

    fn close_session(&self) {
        self.fetcher.close_session();
    }

    fn is_open(&self) -> bool {
        self.fetcher.is_open()
    }

    fn fetch_stats(&self) -> FetchStats {
        self.fetcher.stats()
    }

    async fn get_metadata(&self) -> Value {
        let request = self.dialect.listing_request();
        match self.send(&request).await {
            Ok(payload) => payload,
            Err(_) => {
                warn!("[{}] listing unavailable, using fallback metadata", self.tag);
                self.dialect.fallback_metadata()
            }
        }
    }

    async fn get_dataset_schema(&self, dataset_id: &str) -> Value {
        let request = self.dialect.schema_request(dataset_id);
        self.send(&request)
            .await
            .unwrap_or_else(|_| self.dialect.empty_schema())
    }

    async fn search_datasets(&self, query: &str) -> Vec<DatasetMetadata> {
        let request = self.dialect.listing_request();
        let listing = self.fetcher.fetch(&request.endpoint, &request.params).await;

        let matches: Vec<DatasetMetadata> = self
            .dialect
            .parse_listing(&listing)
            .into_iter()
            .filter_map(Result::ok)
            .filter_map(|raw| self.normalize(raw, series_fields()).ok())
            .filter(|d| d.matches_query(query))
            .collect();

        debug!("[{}] search '{}': {} matches", self.tag, query, matches.len());
        matches
    }

    async fn convert_to_standard_metadata(&self) -> Result<Vec<DatasetMetadata>, ConnectorError> {
        let request = self.dialect.listing_request();
        let listing = self.send(&request).await?;

        let entries = self.dialect.parse_listing(&listing);
        let total = entries.len();
        let mut datasets = Vec::with_capacity(total);

        for entry in entries {
            let raw = match entry {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("[{}] skipping listing entry: {}", self.tag, e);
                    continue;
                }
            };

            let schema = self.get_dataset_schema(&raw.id).await;
            let fields = self.dialect.parse_schema(&schema);

            match self.normalize(raw, fields) {
                Ok(metadata) => datasets.push(metadata),
                Err(e) => warn!("[{}] skipping dataset: {}", self.tag, e),
            }
        }

        info!(
            "[{}] converted {} of {} datasets",
            self.tag,
            datasets.len(),
            total
        );
        Ok(datasets)
    }

    async fn get_dataset_data(&self, dataset_id: &str, query: &SeriesQuery) -> Vec<SeriesRecord> {
        let request = self.dialect.data_request(dataset_id, query);
        let payload = self.fetcher.fetch(&request.endpoint, &request.params).await;
        let records = self.dialect.parse_series(&payload);
        debug!("[{}] {}: {} records", self.tag, dataset_id, records.len());
        records
    }
}
