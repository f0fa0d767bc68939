use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::values::Value;

/// One observation of a statistical series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesRecord {
    pub date: NaiveDate,
    pub value: Value,
    /// Period-over-period change, when the source reports it
    #[serde(default)]
    pub change: Option<Value>,
}

impl SeriesRecord {
    pub fn new(date: NaiveDate, value: Value) -> Self {
        Self {
            date,
            value,
            change: None,
        }
    }

    pub fn with_change(mut self, change: Value) -> Self {
        self.change = Some(change);
        self
    }
}

/// Resolved time selection for a series request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesWindow {
    /// The last N periods published
    LastN(u32),
    /// Every period between two dates (inclusive)
    Range { start: NaiveDate, end: NaiveDate },
    /// The whole series
    All,
}

/// Request parameters for fetching series data
///
/// A "last N" request and a date range are distinct modes; when both are
/// set, last-N wins (see [`SeriesQuery::window`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesQuery {
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
    #[serde(default)]
    pub last_n: Option<u32>,
    /// Source-specific periodicity code (INE: 1=monthly, 3=quarterly, 12=yearly)
    #[serde(default)]
    pub periodicity: Option<u32>,
    #[serde(default)]
    pub detail_level: Option<u8>,
    #[serde(default)]
    pub friendly_format: bool,
    #[serde(default)]
    pub include_metadata: bool,
}

impl SeriesQuery {
    /// Every period between `start` and `end`
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            ..Default::default()
        }
    }

    /// The last `n` periods
    pub fn last(n: u32) -> Self {
        Self {
            last_n: Some(n),
            ..Default::default()
        }
    }

    pub fn with_last(mut self, n: u32) -> Self {
        self.last_n = Some(n);
        self
    }

    pub fn with_periodicity(mut self, periodicity: u32) -> Self {
        self.periodicity = Some(periodicity);
        self
    }

    pub fn with_detail_level(mut self, level: u8) -> Self {
        self.detail_level = Some(level);
        self
    }

    pub fn friendly(mut self) -> Self {
        self.friendly_format = true;
        self
    }

    pub fn with_metadata(mut self) -> Self {
        self.include_metadata = true;
        self
    }

    /// Resolve the requested time window
    ///
    /// Last-N takes precedence over a date range. A range needs both ends;
    /// a half-open range falls back to the whole series.
    pub fn window(&self) -> SeriesWindow {
        match (self.last_n, self.start, self.end) {
            (Some(n), _, _) => SeriesWindow::LastN(n),
            (None, Some(start), Some(end)) => SeriesWindow::Range { start, end },
            _ => SeriesWindow::All,
        }
    }
}
