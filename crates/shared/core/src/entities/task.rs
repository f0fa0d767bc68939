use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of modelling task requested upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    TimeSeriesRegression,
    Classification,
    Regression,
    Clustering,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("Target variable is empty")]
    EmptyTarget,

    #[error("Horizon is required for time series regression tasks")]
    MissingHorizon,
}

/// Structured task specification produced by the intent parser
///
/// Discovery treats it as opaque input: only the target (plus an optional
/// region) is used, to build a catalog search query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpecification {
    pub task_type: TaskType,
    pub target: String,
    #[serde(default)]
    pub features: Vec<String>,
    pub metric: String,
    /// Prediction horizon, e.g. "3M" (time series only)
    #[serde(default)]
    pub horizon: Option<String>,
}

impl TaskSpecification {
    pub fn validate(&self) -> Result<(), TaskError> {
        if self.target.trim().is_empty() {
            return Err(TaskError::EmptyTarget);
        }
        if self.task_type == TaskType::TimeSeriesRegression && self.horizon.is_none() {
            return Err(TaskError::MissingHorizon);
        }
        Ok(())
    }

    /// Search text for the catalog: `"{target} {region}"`
    pub fn search_query(&self, region: &str) -> String {
        let target = self.target.trim();
        let region = region.trim();
        if region.is_empty() {
            target.to_string()
        } else {
            format!("{} {}", target, region)
        }
    }
}
