use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

use super::schema::FieldSchema;
use crate::sources::SourceId;
use crate::values::{DatasetId, Timestamp};

/// Canonical metadata errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Dataset id is empty")]
    EmptyId,

    #[error("Dataset {dataset_id} has a schema field with an empty name")]
    EmptyFieldName { dataset_id: String },

    #[error("Dataset {dataset_id}: schema key '{key}' does not match field name '{name}'")]
    FieldNameMismatch {
        dataset_id: String,
        key: String,
        name: String,
    },
}

/// Canonical metadata for one dataset
///
/// Every connector normalises its source's raw listing into this shape.
/// `id` is the catalog key; re-adding the same id replaces the whole value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub id: DatasetId,
    pub name: String,
    pub source: SourceId,
    pub endpoint: Url,
    pub schema: BTreeMap<String, FieldSchema>,
    pub update_frequency: String,
    pub last_updated: Timestamp,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub license: Option<String>,
    /// Requests per minute allowed by the source
    #[serde(default)]
    pub rate_limit: Option<u32>,
}

impl DatasetMetadata {
    /// Create metadata with an empty schema, `unknown` frequency and the
    /// current time as `last_updated`
    pub fn new(
        id: impl Into<DatasetId>,
        name: impl Into<String>,
        source: SourceId,
        endpoint: Url,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source,
            endpoint,
            schema: BTreeMap::new(),
            update_frequency: "unknown".to_string(),
            last_updated: Utc::now(),
            description: None,
            tags: Vec::new(),
            license: None,
            rate_limit: None,
        }
    }

    /// Add a field, keyed by its name
    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.schema.insert(field.name.clone(), field);
        self
    }

    /// Replace the schema with the given fields
    pub fn with_schema(mut self, fields: impl IntoIterator<Item = FieldSchema>) -> Self {
        self.schema = fields.into_iter().map(|f| (f.name.clone(), f)).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_update_frequency(mut self, frequency: impl Into<String>) -> Self {
        self.update_frequency = frequency.into();
        self
    }

    pub fn with_last_updated(mut self, last_updated: Timestamp) -> Self {
        self.last_updated = last_updated;
        self
    }

    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.license = Some(license.into());
        self
    }

    pub fn with_rate_limit(mut self, requests_per_minute: u32) -> Self {
        self.rate_limit = Some(requests_per_minute);
        self
    }

    /// Check the catalog invariants that the type system does not enforce
    pub fn validate(&self) -> Result<(), MetadataError> {
        if self.id.trim().is_empty() {
            return Err(MetadataError::EmptyId);
        }

        for (key, field) in &self.schema {
            if key.is_empty() || field.name.is_empty() {
                return Err(MetadataError::EmptyFieldName {
                    dataset_id: self.id.clone(),
                });
            }
            if key != &field.name {
                return Err(MetadataError::FieldNameMismatch {
                    dataset_id: self.id.clone(),
                    key: key.clone(),
                    name: field.name.clone(),
                });
            }
        }

        Ok(())
    }

    /// Case-insensitive substring match on name, description or any tag
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.to_lowercase();

        self.name.to_lowercase().contains(&query)
            || self
                .description
                .as_ref()
                .is_some_and(|d| d.to_lowercase().contains(&query))
            || self.tags.iter().any(|t| t.to_lowercase().contains(&query))
    }

    /// True when every tag in `tags` is present on this dataset
    pub fn has_all_tags<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        tags.iter()
            .all(|wanted| self.tags.iter().any(|t| t == wanted.as_ref()))
    }

    /// True when at least one tag in `tags` is present on this dataset
    pub fn has_any_tag<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        tags.iter()
            .any(|wanted| self.tags.iter().any(|t| t == wanted.as_ref()))
    }
}
