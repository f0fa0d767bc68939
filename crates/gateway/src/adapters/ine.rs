//! INE (Spanish National Statistics Institute) - Tempus JSON API
//!
//! Listing: `OPERACIONES_DISPONIBLES`, schema: `VARIABLES_OPERACION/{op}`,
//! data: `DATOS_SERIE/{series}`. Besides the uniform connector surface this
//! module exposes the operation-level queries of the Tempus API on
//! [`IneConnector`].

use serde_json::{Value, json};
use statlas_core::{FieldSchema, SeriesQuery, SeriesRecord, SeriesWindow, SourceId, data_types};
use statlas_ports::{ConnectorError, FetchError};

use super::connector::StatisticsConnector;
use super::dialect::{RawDataset, SourceDialect, SourceRequest, invalid_entry, series_fields};
use super::parse;
use crate::fetcher::QueryParams;

pub const INE_BASE_URL: &str = "https://servicios.ine.es/wstempus/js/ES";

/// Requests per minute
pub const INE_RATE_LIMIT: u32 = 100;

/// INE connector
pub type IneConnector = StatisticsConnector<IneDialect>;

/// Field filter for operation-level queries: variable id and value id,
/// sent as `g{n}={variable}:{value}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableFilter {
    pub variable: String,
    pub value: String,
}

impl VariableFilter {
    pub fn new(variable: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IneDialect;

impl IneDialect {
    /// `tip` output-format parameter: `A` friendly, `M` metadata, `AM` both
    fn output_format(friendly: bool, metadata: bool) -> Option<String> {
        let mut tip = String::new();
        if friendly {
            tip.push('A');
        }
        if metadata {
            tip.push('M');
        }
        (!tip.is_empty()).then_some(tip)
    }

    fn push_filters(params: &mut QueryParams, filters: &[VariableFilter]) {
        for (i, filter) in filters.iter().enumerate() {
            params.push(
                format!("g{}", i + 1),
                format!("{}:{}", filter.variable, filter.value),
            );
        }
    }
}

impl SourceDialect for IneDialect {
    fn source_id(&self) -> SourceId {
        SourceId::ine()
    }

    fn default_base_url(&self) -> &'static str {
        INE_BASE_URL
    }

    fn default_rate_limit(&self) -> u32 {
        INE_RATE_LIMIT
    }

    fn listing_request(&self) -> SourceRequest {
        SourceRequest::new("OPERACIONES_DISPONIBLES")
    }

    fn fallback_metadata(&self) -> Value {
        json!({
            "name": "INE API",
            "description": "Spanish National Statistics Institute API",
            "version": "1.0"
        })
    }

    fn parse_listing(&self, payload: &Value) -> Vec<Result<RawDataset, ConnectorError>> {
        parse::items(payload, &["operaciones", "Operaciones"])
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let id = parse::text(entry, &["Codigo", "Id"])
                    .ok_or_else(|| invalid_entry(entry, i, "missing Id"))?;
                let name = parse::text(entry, &["Nombre"])
                    .ok_or_else(|| invalid_entry(entry, i, "missing Nombre"))?;

                let mut raw = RawDataset::new(id, name);
                raw.description = parse::text(entry, &["Descripcion"]);
                raw.update_frequency =
                    Some(parse::text(entry, &["Periodicidad"]).unwrap_or_else(|| "monthly".to_string()));
                raw.last_updated = entry.get("FechaActualizacion").cloned();
                Ok(raw)
            })
            .collect()
    }

    fn schema_request(&self, dataset_id: &str) -> SourceRequest {
        SourceRequest::new(format!("VARIABLES_OPERACION/{}", dataset_id))
    }

    /// Series fields plus one field per operation variable; empty when the
    /// operation reports no variables
    fn parse_schema(&self, payload: &Value) -> Vec<FieldSchema> {
        let variables = parse::items(payload, &["variables", "Variables"]);
        if variables.is_empty() {
            return Vec::new();
        }

        let mut fields = series_fields();
        for variable in variables {
            let Some(name) = parse::text(variable, &["Nombre", "Id"]) else {
                continue;
            };
            if fields.iter().any(|f| f.name == name) {
                continue;
            }
            let data_type =
                parse::text(variable, &["Tipo"]).unwrap_or_else(|| data_types::STRING.to_string());
            let mut field = FieldSchema::new(name, data_type);
            if let Some(id) = parse::text(variable, &["Id"]) {
                field = field.with_description(format!("INE variable {}", id));
            }
            fields.push(field);
        }
        fields
    }

    fn dataset_path(&self, dataset_id: &str) -> String {
        format!("DATOS_SERIE/{}", dataset_id)
    }

    fn implied_tags(&self, dataset_id: &str) -> Vec<String> {
        if dataset_id.to_uppercase().starts_with("IPC") {
            vec!["inflation".into(), "prices".into(), "economy".into()]
        } else {
            Vec::new()
        }
    }

    fn data_request(&self, dataset_id: &str, query: &SeriesQuery) -> SourceRequest {
        let mut params = QueryParams::new();
        match query.window() {
            SeriesWindow::LastN(n) => params.push("nult", n),
            SeriesWindow::Range { start, end } => params.push(
                "date",
                format!("{}:{}", start.format("%Y%m%d"), end.format("%Y%m%d")),
            ),
            SeriesWindow::All => {}
        }
        params.push_opt("p", query.periodicity);
        params.push_opt("det", query.detail_level);
        params.push_opt(
            "tip",
            Self::output_format(query.friendly_format, query.include_metadata),
        );

        SourceRequest::new(self.dataset_path(dataset_id)).with_params(params)
    }

    fn parse_series(&self, payload: &Value) -> Vec<SeriesRecord> {
        let Some(data) = payload.get("Data").and_then(Value::as_array) else {
            return Vec::new();
        };

        data.iter()
            .filter_map(|point| {
                let date = parse::date(point.get("Fecha")?)?;
                let value = parse::decimal(point.get("Valor")?)?;
                let record = SeriesRecord::new(date, value);
                Some(match point.get("Variacion").and_then(parse::decimal) {
                    Some(change) => record.with_change(change),
                    None => record,
                })
            })
            .collect()
    }
}

/// Operation-level Tempus queries
///
/// Unlike the uniform surface these surface fetch errors to the caller.
impl StatisticsConnector<IneDialect> {
    /// Series of an operation matching variable filters
    /// (`DATOS_METADATAOPERACION/{op}`)
    pub async fn series_by_filters(
        &self,
        operation_id: &str,
        filters: &[VariableFilter],
        query: &SeriesQuery,
    ) -> Result<Value, FetchError> {
        let mut params = QueryParams::new();
        IneDialect::push_filters(&mut params, filters);
        params.push_opt("p", query.periodicity);
        params.push_opt("nult", query.last_n);
        params.push_opt("det", query.detail_level);
        params.push_opt(
            "tip",
            IneDialect::output_format(query.friendly_format, query.include_metadata),
        );

        let request = SourceRequest::new(format!("DATOS_METADATAOPERACION/{}", operation_id))
            .with_params(params);
        self.send(&request).await
    }

    /// Periodicity codes known to INE (`PERIODICIDADES`)
    pub async fn available_periodicities(&self) -> Result<Value, FetchError> {
        self.send(&SourceRequest::new("PERIODICIDADES")).await
    }

    /// Values a variable takes within an operation
    /// (`VALORES_VARIABLEOPERACION/{var}/{op}`)
    pub async fn variable_values(
        &self,
        operation_id: &str,
        variable_id: &str,
    ) -> Result<Value, FetchError> {
        let request = SourceRequest::new(format!(
            "VALORES_VARIABLEOPERACION/{}/{}",
            variable_id, operation_id
        ));
        self.send(&request).await
    }

    /// Metadata of the series matching variable filters
    /// (`SERIE_METADATAOPERACION/{op}`)
    pub async fn series_metadata(
        &self,
        operation_id: &str,
        filters: &[VariableFilter],
        periodicity: Option<u32>,
        detail_level: Option<u8>,
        friendly_format: bool,
    ) -> Result<Value, FetchError> {
        let mut params = QueryParams::new();
        IneDialect::push_filters(&mut params, filters);
        params.push_opt("p", periodicity);
        params.push_opt("det", detail_level);
        params.push_opt("tip", IneDialect::output_format(friendly_format, false));

        let request = SourceRequest::new(format!("SERIE_METADATAOPERACION/{}", operation_id))
            .with_params(params);
        self.send(&request).await
    }
}
