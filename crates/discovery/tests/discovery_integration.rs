//! Integration test: full discovery refresh over scripted sources
//!
//! Registry -> Orchestrator (fan-out, timeout, cancellation) -> Catalog -> Store

use async_trait::async_trait;
use serde_json::{Value, json};
use statlas_catalog::InMemoryCatalogStore;
use statlas_core::{DatasetMetadata, SeriesQuery, SeriesRecord, SourceHealth, SourceId};
use statlas_discovery::registry::builtin;
use statlas_discovery::{
    ConnectorRegistry, DiscoveryError, DiscoveryOrchestrator, RefreshSettings,
    load_config_from_str,
};
use statlas_gateway::{ConnectorSettings, ScriptedTransport};
use statlas_ports::{ConnectorError, FetchError, FetchStats, SourceConnector};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const NO_TAGS: &[&str] = &[];

fn ine_listing(codes: &[&str]) -> Value {
    let entries: Vec<Value> = codes
        .iter()
        .map(|code| {
            json!({
                "Codigo": code,
                "Nombre": match *code {
                    "IPC" => "Índice de Precios de Consumo".to_string(),
                    other => format!("Operación {}", other),
                },
                "Periodicidad": "Mensual",
                "FechaActualizacion": 1704067200000_i64
            })
        })
        .collect();
    Value::Array(entries)
}

fn ine() -> ScriptedTransport {
    ScriptedTransport::new()
        .with_json("OPERACIONES_DISPONIBLES", ine_listing(&["IPC", "EPA"]))
        .with_json(
            "VARIABLES_OPERACION/IPC",
            json!([{"Id": 70, "Nombre": "Comunidades y Ciudades Autónomas"}]),
        )
        .with_json("VARIABLES_OPERACION/EPA", json!([]))
}

fn aemet_listing(ids: &[&str]) -> Value {
    let datasets: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "name": format!("Serie {}", id),
                "description": "Observaciones diarias",
                "frequency": "daily",
                "last_updated": "2024-01-01T00:00:00Z",
                "tags": ["temperature"]
            })
        })
        .collect();
    json!({ "datasets": datasets })
}

fn aemet() -> ScriptedTransport {
    ScriptedTransport::new()
        .with_json("catalogo", aemet_listing(&["temp-diaria"]))
        .with_json(
            "catalogo/temp-diaria/campos",
            json!({"variables": [
                {"name": "fecha", "type": "datetime", "nullable": false},
                {"name": "tmed", "type": "float", "description": "Temperatura media"}
            ]}),
        )
}

fn eurostat() -> ScriptedTransport {
    ScriptedTransport::new()
        .with_json(
            "dissemination/catalogue/datasets",
            json!({"datasets": [{
                "code": "prc_hicp_manr",
                "title": "HICP - monthly data (annual rate of change)",
                "shortDescription": "Harmonised index of consumer prices",
                "lastUpdate": "2024-01-17T11:00:00+01:00",
                "themes": ["prices"]
            }]}),
        )
        .with_json(
            "dissemination/statistics/1.0/data/prc_hicp_manr",
            json!({
                "id": ["geo", "time"],
                "size": [1, 1],
                "dimension": {
                    "geo": {"label": "Geopolitical entity", "category": {"index": {"ES": 0}}},
                    "time": {"label": "Time", "category": {"index": {"2023-12": 0}}}
                },
                "value": {"0": 3.3}
            }),
        )
}

fn connector(id: &str, transport: &ScriptedTransport) -> Arc<dyn SourceConnector> {
    connector_with(id, transport, ConnectorSettings::default())
}

fn connector_with(
    id: &str,
    transport: &ScriptedTransport,
    settings: ConnectorSettings,
) -> Arc<dyn SourceConnector> {
    builtin(id, Arc::new(transport.clone()), settings).unwrap()
}

/// Short cache so paused-time tests can observe upstream changes
fn short_cache() -> ConnectorSettings {
    ConnectorSettings {
        cache_ttl: Duration::from_secs(60),
        ..Default::default()
    }
}

fn ids(datasets: &[DatasetMetadata]) -> Vec<&str> {
    datasets.iter().map(|d| d.id.as_str()).collect()
}

/// Connector whose every call fails
struct BrokenConnector {
    source: SourceId,
}

#[async_trait]
impl SourceConnector for BrokenConnector {
    fn source_id(&self) -> &SourceId {
        &self.source
    }

    fn rate_limit(&self) -> u32 {
        1
    }

    fn open_session(&self) -> Result<(), FetchError> {
        Ok(())
    }

    fn close_session(&self) {}

    fn is_open(&self) -> bool {
        true
    }

    fn fetch_stats(&self) -> FetchStats {
        FetchStats::default()
    }

    async fn get_metadata(&self) -> Value {
        json!({})
    }

    async fn get_dataset_schema(&self, _dataset_id: &str) -> Value {
        json!({"fields": {}})
    }

    async fn search_datasets(&self, _query: &str) -> Vec<DatasetMetadata> {
        Vec::new()
    }

    async fn convert_to_standard_metadata(&self) -> Result<Vec<DatasetMetadata>, ConnectorError> {
        Err(FetchError::Network("connection refused".to_string()).into())
    }

    async fn get_dataset_data(&self, _dataset_id: &str, _query: &SeriesQuery) -> Vec<SeriesRecord> {
        Vec::new()
    }
}

#[tokio::test]
async fn test_partial_failure_keeps_healthy_sources() {
    let _ = env_logger::try_init();

    let registry = ConnectorRegistry::new()
        .with(connector("ine", &ine()))
        .with(Arc::new(BrokenConnector {
            source: SourceId::aemet(),
        }))
        .with(connector("eurostat", &eurostat()));
    let mut orchestrator = DiscoveryOrchestrator::new(registry);
    let mut discovery = orchestrator.activate();

    let report = discovery.refresh_catalog().await.unwrap();

    assert_eq!(ids(&discovery.list().unwrap()), vec!["EPA", "IPC", "prc_hicp_manr"]);
    assert_eq!(report.added, 3);
    assert_eq!(report.failed_sources(), vec![&SourceId::aemet()]);
    assert!(matches!(
        &report.status("aemet").unwrap().health,
        SourceHealth::Failed { reason } if reason.contains("connection refused")
    ));
    assert_eq!(report.status("ine").unwrap().health, SourceHealth::Healthy);
    assert_eq!(report.status("eurostat").unwrap().datasets, 1);
    assert_eq!(discovery.source_status().len(), 3);
}

#[tokio::test]
async fn test_refresh_is_idempotent() {
    let (ine, aemet, eurostat) = (ine(), aemet(), eurostat());
    let registry = ConnectorRegistry::new()
        .with(connector("ine", &ine))
        .with(connector("aemet", &aemet))
        .with(connector("eurostat", &eurostat));
    let mut orchestrator = DiscoveryOrchestrator::new(registry);
    let mut discovery = orchestrator.activate();

    discovery.refresh_catalog().await.unwrap();
    let first = discovery.list().unwrap();
    let second_report = discovery.refresh_catalog().await.unwrap();
    let second = discovery.list().unwrap();

    assert_eq!(first.len(), 4);
    assert_eq!(first, second);
    assert_eq!(second_report.removed, 0);
    assert!(second_report.is_complete());

    let ipc = discovery.get("IPC").unwrap();
    assert_eq!(ipc.source, SourceId::ine());
    assert_eq!(ipc.update_frequency, "Mensual");
    assert!(ipc.schema.contains_key("Comunidades y Ciudades Autónomas"));
    assert!(ipc.tags.iter().any(|t| t == "inflation"));

    let weather = discovery.search("serie", &["weather"]).unwrap();
    assert_eq!(ids(&weather), vec!["temp-diaria"]);
    assert!(!weather[0].schema["fecha"].is_nullable);
}

#[tokio::test]
async fn test_id_collision_is_namespaced() {
    let aemet = aemet().with_json("catalogo", aemet_listing(&["temp-diaria", "IPC"]));
    let registry = ConnectorRegistry::new()
        .with(connector("ine", &ine()))
        .with(connector("aemet", &aemet));
    let mut orchestrator = DiscoveryOrchestrator::new(registry);
    let mut discovery = orchestrator.activate();

    let report = discovery.refresh_catalog().await.unwrap();

    assert_eq!(report.collisions.len(), 1);
    let collision = &report.collisions[0];
    assert_eq!(collision.id, "IPC");
    assert_eq!(collision.kept_by, SourceId::ine());
    assert_eq!(collision.renamed_for, SourceId::aemet());
    assert_eq!(collision.stored_as, "aemet:IPC");

    assert_eq!(discovery.get("IPC").unwrap().source, SourceId::ine());
    assert_eq!(discovery.get("aemet:IPC").unwrap().source, SourceId::aemet());

    // Same resolution on every refresh
    let again = discovery.refresh_catalog().await.unwrap();
    assert_eq!(again.collisions, report.collisions);
    assert_eq!(discovery.list().unwrap().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_slow_source_times_out() {
    let slow = eurostat().with_latency(Duration::from_secs(30));
    let registry = ConnectorRegistry::new()
        .with(connector("ine", &ine()))
        .with(connector("eurostat", &slow));
    let mut orchestrator = DiscoveryOrchestrator::new(registry).with_settings(RefreshSettings {
        connector_timeout: Duration::from_secs(5),
        ..Default::default()
    });
    let mut discovery = orchestrator.activate();

    let start = Instant::now();
    let report = discovery.refresh_catalog().await.unwrap();

    assert!(start.elapsed() >= Duration::from_secs(5));
    assert!(start.elapsed() < Duration::from_secs(30));
    assert_eq!(
        report.status("eurostat").unwrap().health,
        SourceHealth::TimedOut {
            after: Duration::from_secs(5)
        }
    );
    assert_eq!(ids(&discovery.list().unwrap()), vec!["EPA", "IPC"]);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_in_flight_refresh() {
    let (ine, aemet) = (
        ine().with_latency(Duration::from_secs(10)),
        aemet().with_latency(Duration::from_secs(10)),
    );
    let registry = ConnectorRegistry::new()
        .with(connector("ine", &ine))
        .with(connector("aemet", &aemet));
    let mut orchestrator = DiscoveryOrchestrator::new(registry);
    let mut discovery = orchestrator.activate();

    let token = discovery.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
    });

    let start = Instant::now();
    let report = discovery.refresh_catalog().await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(10));
    assert!(
        report
            .statuses
            .iter()
            .all(|s| s.health == SourceHealth::Cancelled)
    );
    assert!(discovery.list().unwrap().is_empty());

    // A fresh token is in place for the next refresh
    assert!(!discovery.cancellation_token().is_cancelled());
    let report = discovery.refresh_catalog().await.unwrap();
    assert!(report.is_complete());
    assert_eq!(discovery.list().unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_prune_drops_vanished_datasets() {
    let ine = ine();
    let registry = ConnectorRegistry::new().with(connector_with("ine", &ine, short_cache()));
    let mut orchestrator = DiscoveryOrchestrator::new(registry);
    let mut discovery = orchestrator.activate();

    discovery.refresh_catalog().await.unwrap();
    assert_eq!(discovery.list().unwrap().len(), 2);

    ine.set_json("OPERACIONES_DISPONIBLES", ine_listing(&["IPC"]));
    tokio::time::sleep(Duration::from_secs(61)).await;

    let report = discovery.refresh_catalog().await.unwrap();
    assert_eq!(report.removed, 1);
    assert_eq!(ids(&discovery.list().unwrap()), vec!["IPC"]);
    assert!(matches!(discovery.get("EPA"), Err(DiscoveryError::NotFound(_))));
}

#[tokio::test(start_paused = true)]
async fn test_pruned_datasets_do_not_return_on_warm_start() {
    let store = InMemoryCatalogStore::new();
    let ine = ine();
    let registry = ConnectorRegistry::new().with(connector_with("ine", &ine, short_cache()));
    let mut first = DiscoveryOrchestrator::new(registry).with_store(Arc::new(store.clone()));
    {
        let mut discovery = first.activate();
        discovery.refresh_catalog().await.unwrap();
        assert_eq!(store.len(), 2);

        ine.set_json("OPERACIONES_DISPONIBLES", ine_listing(&["IPC"]));
        tokio::time::sleep(Duration::from_secs(61)).await;

        let report = discovery.refresh_catalog().await.unwrap();
        assert_eq!(report.removed, 1);
        assert_eq!(report.persisted, Some(true));
    }
    assert_eq!(store.len(), 1);

    let offline = ScriptedTransport::new().failing();
    let registry = ConnectorRegistry::new().with(connector("ine", &offline));
    let mut second = DiscoveryOrchestrator::new(registry).with_store(Arc::new(store));
    let mut discovery = second.activate();

    assert_eq!(discovery.load_persisted().await.unwrap(), 1);
    assert_eq!(ids(&discovery.list().unwrap()), vec!["IPC"]);
}

#[tokio::test(start_paused = true)]
async fn test_without_prune_vanished_datasets_stay() {
    let ine = ine();
    let registry = ConnectorRegistry::new().with(connector_with("ine", &ine, short_cache()));
    let mut orchestrator = DiscoveryOrchestrator::new(registry).with_settings(RefreshSettings {
        prune_missing: false,
        ..Default::default()
    });
    let mut discovery = orchestrator.activate();

    discovery.refresh_catalog().await.unwrap();
    ine.set_json("OPERACIONES_DISPONIBLES", ine_listing(&["IPC"]));
    tokio::time::sleep(Duration::from_secs(61)).await;

    let report = discovery.refresh_catalog().await.unwrap();
    assert_eq!(report.removed, 0);
    assert_eq!(discovery.list().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_source_keeps_previous_entries() {
    let aemet = aemet();
    let registry = ConnectorRegistry::new()
        .with(connector("ine", &ine()))
        .with(connector_with("aemet", &aemet, short_cache()));
    let mut orchestrator = DiscoveryOrchestrator::new(registry);
    let mut discovery = orchestrator.activate();

    discovery.refresh_catalog().await.unwrap();
    aemet.remove_route("catalogo");
    tokio::time::sleep(Duration::from_secs(61)).await;

    let report = discovery.refresh_catalog().await.unwrap();
    assert!(matches!(
        report.status("aemet").unwrap().health,
        SourceHealth::Failed { .. }
    ));
    assert_eq!(report.status("aemet").unwrap().datasets, 0);
    assert!(discovery.get("temp-diaria").is_ok());
    assert_eq!(discovery.list().unwrap().len(), 3);
}

#[tokio::test]
async fn test_masked_outage_is_reported_as_degraded() {
    let ine = ine();
    ine.remove_route("VARIABLES_OPERACION/EPA");
    let registry = ConnectorRegistry::new().with(connector("ine", &ine));
    let mut orchestrator = DiscoveryOrchestrator::new(registry);
    let mut discovery = orchestrator.activate();

    let report = discovery.refresh_catalog().await.unwrap();

    match &report.status("ine").unwrap().health {
        SourceHealth::Degraded {
            failures,
            last_error,
        } => {
            assert_eq!(*failures, 1);
            assert!(last_error.as_deref().unwrap_or_default().contains("404"));
        }
        other => panic!("expected degraded, got {:?}", other),
    }
    // The dataset is still catalogued, with an empty schema
    assert!(discovery.get("EPA").unwrap().schema.is_empty());
    assert!(report.is_complete());
}

#[tokio::test]
async fn test_sessions_closed_on_every_exit_path() {
    let (ine, aemet) = (ine(), aemet());
    let registry = ConnectorRegistry::new()
        .with(connector("ine", &ine))
        .with(connector("aemet", &aemet));
    let mut orchestrator = DiscoveryOrchestrator::new(registry);

    async fn lookup_missing(
        orchestrator: &mut DiscoveryOrchestrator,
    ) -> Result<String, DiscoveryError> {
        let mut discovery = orchestrator.activate();
        discovery.refresh_catalog().await?;
        let entry = discovery.get("does-not-exist")?;
        Ok(entry.name.clone())
    }

    let result = lookup_missing(&mut orchestrator).await;

    assert!(matches!(result, Err(DiscoveryError::NotFound(id)) if id == "does-not-exist"));
    assert!(!orchestrator.is_active());
    assert_eq!(ine.opened(), 1);
    assert_eq!(ine.open_sessions(), 0);
    assert_eq!(aemet.open_sessions(), 0);
}

#[tokio::test]
async fn test_persisted_catalog_warm_starts_next_run() {
    let store = InMemoryCatalogStore::new();

    let registry = ConnectorRegistry::new()
        .with(connector("ine", &ine()))
        .with(connector("eurostat", &eurostat()));
    let mut first = DiscoveryOrchestrator::new(registry).with_store(Arc::new(store.clone()));
    let saved = {
        let mut discovery = first.activate();
        let report = discovery.refresh_catalog().await.unwrap();
        assert_eq!(report.persisted, Some(true));
        discovery.list().unwrap()
    };
    assert_eq!(store.len(), 3);

    // Upstream is down on the next run; the persisted catalog still serves
    let offline = ScriptedTransport::new().failing();
    let registry = ConnectorRegistry::new()
        .with(connector("ine", &offline))
        .with(connector("eurostat", &offline));
    let mut second = DiscoveryOrchestrator::new(registry).with_store(Arc::new(store));
    let mut discovery = second.activate();

    assert_eq!(discovery.load_persisted().await.unwrap(), 3);
    let report = discovery.refresh_catalog().await.unwrap();
    assert_eq!(report.failed_sources().len(), 2);
    assert_eq!(discovery.list().unwrap(), saved);
    assert_eq!(discovery.search("consumer prices", NO_TAGS).unwrap().len(), 1);
}

#[tokio::test]
async fn test_orchestrator_from_config() {
    let transport = ine().with_json("catalogo", aemet_listing(&["temp-diaria"]));
    let config = load_config_from_str(
        r#"{
            "sources": [
                {"id": "ine", "rate_limit": 50},
                {"id": "aemet"},
                {"id": "eurostat", "enabled": false}
            ],
            "global": {"connector_timeout_secs": 10, "prune_missing": false},
            "persistence": {"enabled": true, "connection": "memory://"}
        }"#,
    )
    .unwrap();

    let mut orchestrator =
        DiscoveryOrchestrator::from_config_with_factory(&config, Arc::new(transport.clone()))
            .unwrap();
    assert_eq!(
        orchestrator.settings(),
        RefreshSettings {
            connector_timeout: Duration::from_secs(10),
            prune_missing: false,
        }
    );

    let mut discovery = orchestrator.activate();
    assert_eq!(transport.open_sessions(), 2);
    assert_eq!(discovery.connector("ine").unwrap().rate_limit(), 50);

    let report = discovery.refresh_catalog().await.unwrap();
    assert_eq!(report.statuses.len(), 2);
    assert_eq!(report.persisted, Some(true));
    assert_eq!(discovery.list().unwrap().len(), 3);
}
