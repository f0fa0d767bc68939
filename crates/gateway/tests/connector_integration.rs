//! Integration test: connectors over the scripted transport
//!
//! Exercises the full path a refresh takes:
//! Connector -> Fetcher (cache, rate gate) -> Session -> canonical metadata

use serde_json::json;
use statlas_core::SeriesQuery;
use statlas_gateway::{
    ConnectorSettings, IneConnector, IneDialect, QueryParams, RateLimitedFetcher,
    ScriptedTransport, fetcher::FetcherConfig,
};
use statlas_ports::SourceConnector;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

fn ine_listing(codes: &[&str]) -> serde_json::Value {
    let entries: Vec<_> = codes
        .iter()
        .map(|c| json!({"Codigo": c, "Nombre": format!("Operation {}", c)}))
        .collect();
    json!(entries)
}

/// A conversion issues one listing call plus one schema call per dataset,
/// all through the rate gate
#[tokio::test(start_paused = true)]
async fn test_conversion_respects_rate_limit() {
    let _ = env_logger::try_init();

    let transport = ScriptedTransport::new().with_json(
        "OPERACIONES_DISPONIBLES",
        ine_listing(&["IPC", "EPA", "PIB"]),
    );
    let connector = IneConnector::new(
        IneDialect,
        Arc::new(transport.clone()),
        ConnectorSettings {
            rate_limit: Some(2),
            rate_window: Duration::from_secs(1),
            ..Default::default()
        },
    )
    .unwrap();
    connector.open_session().unwrap();

    let start = Instant::now();
    let datasets = connector.convert_to_standard_metadata().await.unwrap();

    // 4 requests at 2 per second: the third waits one window
    assert_eq!(datasets.len(), 3);
    assert_eq!(transport.total_requests(), 4);
    assert!(start.elapsed() >= Duration::from_secs(1));
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(connector.rate_limit(), 2);
}

/// Waiters beyond the limit are released in arrival order
#[tokio::test(start_paused = true)]
async fn test_concurrent_fetches_release_fifo() {
    let transport = ScriptedTransport::new()
        .with_json("a", json!({"n": 0}))
        .with_json("b", json!({"n": 1}))
        .with_json("c", json!({"n": 2}));
    let fetcher = Arc::new(RateLimitedFetcher::new(
        "test",
        Url::parse("https://api.example.org").unwrap(),
        Arc::new(transport.clone()),
        FetcherConfig {
            rate_limit: 1,
            rate_window: Duration::from_secs(1),
            ..Default::default()
        },
    ));
    fetcher.open_session().unwrap();

    let mut handles = Vec::new();
    for endpoint in ["a", "b", "c"] {
        let fetcher = Arc::clone(&fetcher);
        handles.push(tokio::spawn(async move {
            fetcher.fetch(endpoint, &QueryParams::new()).await;
            Instant::now()
        }));
        tokio::task::yield_now().await;
    }

    let mut finished = Vec::new();
    for handle in handles {
        finished.push(handle.await.unwrap());
    }

    assert!(finished[0] < finished[1]);
    assert!(finished[1] < finished[2]);
    let order: Vec<String> = transport
        .requested()
        .iter()
        .map(|u| u.path().trim_start_matches('/').to_string())
        .collect();
    assert_eq!(order, vec!["a", "b", "c"]);
}

/// Two connectors never share a cache
#[tokio::test]
async fn test_connectors_own_their_cache() {
    let transport = ScriptedTransport::new().with_json(
        "DATOS_SERIE/IPC251856",
        json!({"Data": [{"Fecha": "2024-01-01", "Valor": 3.4}]}),
    );
    let first = IneConnector::with_defaults(IneDialect, Arc::new(transport.clone())).unwrap();
    let second = IneConnector::with_defaults(IneDialect, Arc::new(transport.clone())).unwrap();
    first.open_session().unwrap();
    second.open_session().unwrap();

    let query = SeriesQuery::last(1);
    first.get_dataset_data("IPC251856", &query).await;
    first.get_dataset_data("IPC251856", &query).await;
    second.get_dataset_data("IPC251856", &query).await;

    assert_eq!(transport.calls("DATOS_SERIE/IPC251856"), 2);
    assert_eq!(first.fetch_stats().cache_hits, 1);
    assert_eq!(second.fetch_stats().cache_hits, 0);
}

/// Closing the session drops the client; later fetches fail soft
#[tokio::test]
async fn test_closed_session_fails_soft() {
    let transport = ScriptedTransport::new().with_json("OPERACIONES_DISPONIBLES", ine_listing(&["IPC"]));
    let connector = IneConnector::with_defaults(IneDialect, Arc::new(transport.clone())).unwrap();

    connector.open_session().unwrap();
    assert_eq!(transport.open_sessions(), 1);
    connector.close_session();
    assert_eq!(transport.open_sessions(), 0);

    assert!(connector.search_datasets("ipc").await.is_empty());
    assert_eq!(
        connector.fetch_stats().last_error.as_deref(),
        Some("Session is not open")
    );
    assert_eq!(transport.total_requests(), 0);
}
