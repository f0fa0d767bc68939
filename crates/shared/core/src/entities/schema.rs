use serde::{Deserialize, Serialize};

/// Common data type names used by connectors when mapping raw field types
pub mod data_types {
    pub const STRING: &str = "string";
    pub const FLOAT: &str = "float";
    pub const INTEGER: &str = "integer";
    pub const DATETIME: &str = "datetime";
    pub const BOOLEAN: &str = "boolean";
}

/// Schema definition for a single dataset field
///
/// `data_type` is kept as the string the source reported (normalised to
/// lowercase) so unknown source types survive a persistence round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_nullable")]
    pub is_nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl FieldSchema {
    /// Create a nullable field without description
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into().to_lowercase(),
            description: None,
            is_nullable: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn not_nullable(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    pub fn nullable(mut self, is_nullable: bool) -> Self {
        self.is_nullable = is_nullable;
        self
    }
}
