use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::sources::SourceId;
use crate::values::Timestamp;

/// Outcome of the last catalog refresh for one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SourceHealth {
    /// Listing fetched and normalised without transport failures
    Healthy,
    /// Conversion finished but some requests failed and were degraded
    /// (fallback payload or empty schema)
    Degraded { failures: u64, last_error: Option<String> },
    /// The connector failed as a whole; its entries were not refreshed
    Failed { reason: String },
    /// The connector did not finish within the refresh timeout
    TimedOut {
        #[serde(with = "duration_secs")]
        after: Duration,
    },
    /// The refresh was cancelled before the connector finished
    Cancelled,
}

impl SourceHealth {
    /// True when the source produced a usable listing
    pub fn is_usable(&self) -> bool {
        matches!(self, SourceHealth::Healthy | SourceHealth::Degraded { .. })
    }
}

/// Per-source status reported alongside the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStatus {
    pub source: SourceId,
    pub health: SourceHealth,
    /// Number of datasets the source contributed in the last refresh
    pub datasets: usize,
    pub refreshed_at: Timestamp,
}

impl SourceStatus {
    pub fn new(source: SourceId, health: SourceHealth, datasets: usize) -> Self {
        Self {
            source,
            health,
            datasets,
            refreshed_at: Utc::now(),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_states() {
        assert!(SourceHealth::Healthy.is_usable());
        assert!(
            SourceHealth::Degraded {
                failures: 1,
                last_error: None
            }
            .is_usable()
        );
        assert!(
            !SourceHealth::Failed {
                reason: "down".to_string()
            }
            .is_usable()
        );
        assert!(!SourceHealth::Cancelled.is_usable());
    }

    #[test]
    fn test_health_serializes_with_state_tag() {
        let json = serde_json::to_value(SourceHealth::TimedOut {
            after: Duration::from_secs(30),
        })
        .unwrap();
        assert_eq!(json["state"], "timed_out");
        assert_eq!(json["after"], 30.0);
    }
}
