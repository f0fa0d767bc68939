//! Eurostat dissemination API (JSON-stat 2.0)
//!
//! A JSON-stat dataset is a dense cube: `id` lists the dimensions, `size`
//! their lengths, and `value` holds the cells in row-major order, either as
//! an array or as a sparse object keyed by flat index. Series are read along
//! the `time` dimension with every other dimension at its first category.

use serde_json::{Value, json};
use statlas_core::{FieldSchema, SeriesQuery, SeriesRecord, SeriesWindow, SourceId, data_types};
use statlas_ports::ConnectorError;

use super::connector::StatisticsConnector;
use super::dialect::{RawDataset, SourceDialect, SourceRequest, invalid_entry};
use super::parse;
use crate::fetcher::QueryParams;

pub const EUROSTAT_BASE_URL: &str = "https://ec.europa.eu/eurostat/api";

/// Requests per minute
pub const EUROSTAT_RATE_LIMIT: u32 = 500;

const DATA_PATH: &str = "dissemination/statistics/1.0/data";

const TIME_DIMENSION: &str = "time";

/// Eurostat connector
pub type EurostatConnector = StatisticsConnector<EurostatDialect>;

#[derive(Debug, Clone, Copy, Default)]
pub struct EurostatDialect;

/// Cell offsets of the time series inside a JSON-stat cube, ordered by time
/// position
///
/// A cube whose sizes do not fit in memory addressing is empty; a time
/// position whose offset overflows is skipped.
fn time_cells(payload: &Value) -> Vec<(String, usize)> {
    let Some(ids) = payload.get("id").and_then(Value::as_array) else {
        return Vec::new();
    };
    let Some(sizes) = payload
        .get("size")
        .and_then(Value::as_array)
        .and_then(|s| {
            s.iter()
                .map(|n| n.as_u64().and_then(|n| usize::try_from(n).ok()))
                .collect::<Option<Vec<usize>>>()
        })
    else {
        return Vec::new();
    };
    if sizes.len() != ids.len() {
        return Vec::new();
    }

    let Some(time_axis) = ids.iter().position(|d| d.as_str() == Some(TIME_DIMENSION)) else {
        return Vec::new();
    };
    let Some(stride) = sizes[time_axis + 1..]
        .iter()
        .try_fold(1usize, |acc, size| acc.checked_mul(*size))
    else {
        return Vec::new();
    };

    let Some(index) = payload
        .pointer("/dimension/time/category/index")
        .and_then(Value::as_object)
    else {
        return Vec::new();
    };

    let mut cells: Vec<(String, usize)> = index
        .iter()
        .filter_map(|(label, pos)| {
            let pos = usize::try_from(pos.as_u64()?).ok()?;
            Some((label.clone(), pos))
        })
        .collect();
    cells.sort_by_key(|(_, pos)| *pos);
    cells
        .into_iter()
        .filter_map(|(label, pos)| Some((label, pos.checked_mul(stride)?)))
        .collect()
}

fn cell(values: &Value, offset: usize) -> Option<&Value> {
    match values {
        Value::Array(cells) => cells.get(offset),
        Value::Object(cells) => cells.get(&offset.to_string()),
        _ => None,
    }
}

impl SourceDialect for EurostatDialect {
    fn source_id(&self) -> SourceId {
        SourceId::eurostat()
    }

    fn default_base_url(&self) -> &'static str {
        EUROSTAT_BASE_URL
    }

    fn default_rate_limit(&self) -> u32 {
        EUROSTAT_RATE_LIMIT
    }

    fn listing_request(&self) -> SourceRequest {
        SourceRequest::new("dissemination/catalogue/datasets")
    }

    fn fallback_metadata(&self) -> Value {
        json!({
            "name": "Eurostat API",
            "description": "Statistical office of the European Union API",
            "version": "1.0"
        })
    }

    fn parse_listing(&self, payload: &Value) -> Vec<Result<RawDataset, ConnectorError>> {
        parse::items(payload, &["datasets"])
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let id = parse::text(entry, &["code"])
                    .ok_or_else(|| invalid_entry(entry, i, "missing code"))?;
                let name = parse::text(entry, &["title"])
                    .ok_or_else(|| invalid_entry(entry, i, "missing title"))?;

                let mut raw = RawDataset::new(id, name);
                raw.description = parse::text(entry, &["shortDescription"]);
                raw.update_frequency = parse::text(entry, &["updateFrequency"]);
                raw.last_updated = entry.get("lastUpdate").cloned();
                raw.tags = parse::strings(entry, "themes");
                raw.license = Some("CC-BY-4.0".to_string());
                Ok(raw)
            })
            .collect()
    }

    fn schema_request(&self, dataset_id: &str) -> SourceRequest {
        SourceRequest::new(self.dataset_path(dataset_id))
            .with_params(QueryParams::new().with("lastTimePeriod", 1))
    }

    /// One field per cube dimension plus the observation value
    fn parse_schema(&self, payload: &Value) -> Vec<FieldSchema> {
        let Some(ids) = payload.get("id").and_then(Value::as_array) else {
            return Vec::new();
        };

        let mut fields: Vec<FieldSchema> = ids
            .iter()
            .filter_map(Value::as_str)
            .map(|dim| {
                let data_type = if dim == TIME_DIMENSION {
                    data_types::DATETIME
                } else {
                    data_types::STRING
                };
                let field = FieldSchema::new(dim, data_type);
                match payload
                    .pointer(&format!("/dimension/{}/label", dim))
                    .and_then(Value::as_str)
                {
                    Some(label) => field.with_description(label),
                    None => field,
                }
            })
            .collect();

        if !fields.is_empty() && !fields.iter().any(|f| f.name == "value") {
            fields.push(FieldSchema::new("value", data_types::FLOAT));
        }
        fields
    }

    fn dataset_path(&self, dataset_id: &str) -> String {
        format!("{}/{}", DATA_PATH, dataset_id)
    }

    fn data_request(&self, dataset_id: &str, query: &SeriesQuery) -> SourceRequest {
        let mut params = QueryParams::new();
        match query.window() {
            SeriesWindow::LastN(n) => params.push("lastTimePeriod", n),
            SeriesWindow::Range { start, end } => {
                params.push("sinceTimePeriod", start.format("%Y-%m"));
                params.push("untilTimePeriod", end.format("%Y-%m"));
            }
            SeriesWindow::All => {}
        }
        SourceRequest::new(self.dataset_path(dataset_id)).with_params(params)
    }

    fn parse_series(&self, payload: &Value) -> Vec<SeriesRecord> {
        let Some(values) = payload.get("value") else {
            return Vec::new();
        };

        time_cells(payload)
            .into_iter()
            .filter_map(|(label, offset)| {
                let date = parse::date(&Value::String(label))?;
                let value = parse::decimal(cell(values, offset)?)?;
                Some(SeriesRecord::new(date, value))
            })
            .collect()
    }
}
