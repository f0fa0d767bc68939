//! Source identifiers

use serde::{Deserialize, Serialize};

/// Identifier of an external statistics source (connector)
///
/// Stored on every `DatasetMetadata` so catalog entries can be traced back
/// to the connector that produced them. Always lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    /// Create a new source ID (normalised to lowercase)
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_lowercase())
    }

    /// Spanish National Statistics Institute
    pub fn ine() -> Self {
        Self::new("ine")
    }

    /// Spanish State Meteorological Agency
    pub fn aemet() -> Self {
        Self::new("aemet")
    }

    /// Statistical office of the European Union
    pub fn eurostat() -> Self {
        Self::new("eurostat")
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for SourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_id_is_lowercase() {
        assert_eq!(SourceId::new(" INE ").as_str(), "ine");
        assert_eq!(SourceId::from("Eurostat"), SourceId::eurostat());
    }

    #[test]
    fn test_source_id_serializes_as_string() {
        let json = serde_json::to_string(&SourceId::aemet()).unwrap();
        assert_eq!(json, "\"aemet\"");
    }
}
