//! AEMET (Spanish State Meteorological Agency) OpenData
//!
//! The catalog exposes a generic dataset listing; each dataset publishes its
//! field list under `campos` and its observations under `datos`.

use serde_json::{Value, json};
use statlas_core::{FieldSchema, SeriesQuery, SeriesRecord, SeriesWindow, SourceId, data_types};
use statlas_ports::ConnectorError;

use super::connector::StatisticsConnector;
use super::dialect::{RawDataset, SourceDialect, SourceRequest, invalid_entry};
use super::parse;
use crate::fetcher::QueryParams;

pub const AEMET_BASE_URL: &str = "https://opendata.aemet.es/opendata/api";

/// Requests per minute
pub const AEMET_RATE_LIMIT: u32 = 60;

/// AEMET connector
pub type AemetConnector = StatisticsConnector<AemetDialect>;

#[derive(Debug, Clone, Copy, Default)]
pub struct AemetDialect;

impl SourceDialect for AemetDialect {
    fn source_id(&self) -> SourceId {
        SourceId::aemet()
    }

    fn default_base_url(&self) -> &'static str {
        AEMET_BASE_URL
    }

    fn default_rate_limit(&self) -> u32 {
        AEMET_RATE_LIMIT
    }

    fn listing_request(&self) -> SourceRequest {
        SourceRequest::new("catalogo")
    }

    fn fallback_metadata(&self) -> Value {
        json!({
            "name": "AEMET OpenData API",
            "description": "Spanish State Meteorological Agency API",
            "version": "1.0"
        })
    }

    fn parse_listing(&self, payload: &Value) -> Vec<Result<RawDataset, ConnectorError>> {
        parse::items(payload, &["datasets"])
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let id = parse::text(entry, &["id"])
                    .ok_or_else(|| invalid_entry(entry, i, "missing id"))?;
                let name = parse::text(entry, &["name", "nombre"])
                    .ok_or_else(|| invalid_entry(entry, i, "missing name"))?;

                let mut raw = RawDataset::new(id, name);
                raw.description = parse::text(entry, &["description", "descripcion"]);
                raw.endpoint = parse::text(entry, &["endpoint"]);
                raw.update_frequency = parse::text(entry, &["frequency"]);
                raw.last_updated = entry.get("last_updated").cloned();
                raw.tags = parse::strings(entry, "tags");
                raw.license = parse::text(entry, &["license"]);
                Ok(raw)
            })
            .collect()
    }

    fn schema_request(&self, dataset_id: &str) -> SourceRequest {
        SourceRequest::new(format!("catalogo/{}/campos", dataset_id))
    }

    fn parse_schema(&self, payload: &Value) -> Vec<FieldSchema> {
        parse::items(payload, &["variables", "campos"])
            .iter()
            .filter_map(|variable| {
                let name = parse::text(variable, &["name", "id"])?;
                let data_type = parse::text(variable, &["type", "tipo"])
                    .unwrap_or_else(|| data_types::STRING.to_string());
                let mut field = FieldSchema::new(name, data_type)
                    .nullable(parse::flag(variable, "nullable").unwrap_or(true));
                if let Some(description) = parse::text(variable, &["description", "descripcion"]) {
                    field = field.with_description(description);
                }
                Some(field)
            })
            .collect()
    }

    fn dataset_path(&self, dataset_id: &str) -> String {
        format!("catalogo/{}/datos", dataset_id)
    }

    fn implied_tags(&self, _dataset_id: &str) -> Vec<String> {
        vec!["weather".into()]
    }

    fn data_request(&self, dataset_id: &str, query: &SeriesQuery) -> SourceRequest {
        let mut params = QueryParams::new();
        match query.window() {
            SeriesWindow::LastN(n) => params.push("ultimos", n),
            SeriesWindow::Range { start, end } => {
                params.push("fechaini", start.format("%Y-%m-%d"));
                params.push("fechafin", end.format("%Y-%m-%d"));
            }
            SeriesWindow::All => {}
        }
        SourceRequest::new(self.dataset_path(dataset_id)).with_params(params)
    }

    fn parse_series(&self, payload: &Value) -> Vec<SeriesRecord> {
        parse::items(payload, &["datos"])
            .iter()
            .filter_map(|point| {
                let date = parse::date(point.get("fecha")?)?;
                let value = parse::decimal(point.get("valor")?)?;
                let record = SeriesRecord::new(date, value);
                Some(match point.get("variacion").and_then(parse::decimal) {
                    Some(change) => record.with_change(change),
                    None => record,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ScriptedTransport;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use statlas_ports::SourceConnector;
    use std::sync::Arc;

    fn listing() -> Value {
        json!({"datasets": [
            {
                "id": "temp-diaria",
                "name": "Temperatura diaria",
                "description": "Daily temperature by station",
                "frequency": "daily",
                "last_updated": "2024-05-01T06:00:00Z",
                "tags": ["temperature", "climate"],
                "license": "CC-BY-4.0"
            },
            {
                "id": "precip",
                "name": "Precipitación",
                "endpoint": "not a url"
            },
            {"name": "no id"}
        ]})
    }

    fn connector(transport: &ScriptedTransport) -> AemetConnector {
        let connector =
            AemetConnector::with_defaults(AemetDialect, Arc::new(transport.clone())).unwrap();
        connector.open_session().unwrap();
        connector
    }

    #[tokio::test]
    async fn test_convert_maps_listing_and_schema() {
        let _ = env_logger::try_init();
        let transport = ScriptedTransport::new()
            .with_json("catalogo", listing())
            .with_json(
                "catalogo/temp-diaria/campos",
                json!({"variables": [
                    {"name": "fecha", "type": "datetime", "nullable": false},
                    {"name": "tmed", "type": "FLOAT", "description": "Mean temperature"}
                ]}),
            );
        let connector = connector(&transport);

        let datasets = connector.convert_to_standard_metadata().await.unwrap();

        assert_eq!(datasets.len(), 1);
        let temp = &datasets[0];
        assert_eq!(temp.id, "temp-diaria");
        assert_eq!(temp.update_frequency, "daily");
        assert_eq!(
            temp.last_updated,
            Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap()
        );
        assert_eq!(temp.license.as_deref(), Some("CC-BY-4.0"));
        assert_eq!(temp.tags, vec!["temperature", "climate", "weather"]);
        assert_eq!(
            temp.endpoint.as_str(),
            "https://opendata.aemet.es/opendata/api/catalogo/temp-diaria/datos"
        );
        assert!(!temp.schema["fecha"].is_nullable);
        assert_eq!(temp.schema["tmed"].data_type, data_types::FLOAT);
        assert_eq!(temp.rate_limit, Some(AEMET_RATE_LIMIT));
    }

    #[tokio::test]
    async fn test_series_range_params() {
        let transport = ScriptedTransport::new().with_json(
            "catalogo/temp-diaria/datos",
            json!({"datos": [
                {"fecha": "2024-05-01", "valor": 18.5, "variacion": -0.3},
                {"fecha": "bad", "valor": 1}
            ]}),
        );
        let connector = connector(&transport);
        let query = SeriesQuery::between(
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
        );

        let records = connector.get_dataset_data("temp-diaria", &query).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, dec!(18.5));
        assert_eq!(records[0].change, Some(dec!(-0.3)));
        let url = &transport.requested()[0];
        assert_eq!(url.query(), Some("fechaini=2024-05-01&fechafin=2024-05-02"));
    }

    #[tokio::test]
    async fn test_unreachable_source_degrades() {
        let transport = ScriptedTransport::new().failing();
        let connector = connector(&transport);

        assert_eq!(connector.get_metadata().await["name"], "AEMET OpenData API");
        assert!(connector.search_datasets("temp").await.is_empty());
        assert!(
            connector
                .get_dataset_data("temp-diaria", &SeriesQuery::last(3))
                .await
                .is_empty()
        );
    }
}
