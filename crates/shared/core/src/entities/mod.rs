mod metadata;
mod schema;
mod series;
mod status;
mod task;

pub use metadata::{DatasetMetadata, MetadataError};
pub use schema::{FieldSchema, data_types};
pub use series::{SeriesQuery, SeriesRecord, SeriesWindow};
pub use status::{SourceHealth, SourceStatus};
pub use task::{TaskError, TaskSpecification, TaskType};
