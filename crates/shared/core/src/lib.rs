//! statlas Core Domain
//!
//! Pure domain types for the statlas discovery system.
//! This crate contains no async, no I/O, and is 100% unit testable.
//!
//! Every source connector normalises its API's payloads into
//! [`DatasetMetadata`] (catalog entries) and [`SeriesRecord`] (observations).

pub mod entities;
pub mod sources;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    // Canonical metadata
    DatasetMetadata,
    FieldSchema,
    MetadataError,
    // Series data
    SeriesQuery,
    SeriesRecord,
    SeriesWindow,
    // Refresh outcome
    SourceHealth,
    SourceStatus,
    // Upstream task specification
    TaskError,
    TaskSpecification,
    TaskType,
    data_types,
};
pub use sources::SourceId;
pub use values::{DatasetId, Timestamp, Value};
