use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use httpmock::prelude::*;
use serde_json::json;
use strategy_health::db::DbPool;
use strategy_health::error::{AppError, CollectorErrorCode};
use strategy_health::models::data_source::{DataSourceConfig, HttpJsonSource, SqlQuerySource};
use strategy_health::models::kpi::{KpiCreateInput, KpiRecord};
use strategy_health::models::snapshot::SnapshotSource;
use strategy_health::models::strategy::{BscDimension, CsfCreateInput, StrategyCreateInput};
use strategy_health::services::collector_registry::CollectorRegistry;
use strategy_health::services::data_collection_service::{CollectionSummary, DataCollectionService};
use strategy_health::services::kpi_service::KpiService;
use strategy_health::services::snapshot_service::SnapshotService;
use strategy_health::services::strategy_service::StrategyService;
use tempfile::{tempdir, TempDir};

struct Fixture {
    _dir: TempDir,
    pool: DbPool,
    kpis: KpiService,
    snapshots: Arc<SnapshotService>,
    csf_id: String,
}

impl Fixture {
    fn service(&self, registry: CollectorRegistry) -> DataCollectionService {
        DataCollectionService::new(
            self.pool.clone(),
            Arc::new(registry),
            Arc::clone(&self.snapshots),
        )
    }

    fn default_service(&self, timeout_ms: u64) -> DataCollectionService {
        let registry =
            CollectorRegistry::with_defaults(self.pool.clone(), timeout_ms).expect("registry");
        self.service(registry)
    }

    fn create_kpi(&self, name: &str, target: f64, source: Option<DataSourceConfig>) -> KpiRecord {
        self.kpis
            .create_kpi(KpiCreateInput {
                csf_id: self.csf_id.clone(),
                name: name.to_string(),
                target_value: Some(target),
                data_source: source,
                ..KpiCreateInput::default()
            })
            .expect("kpi")
    }
}

fn setup() -> Fixture {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("collection.sqlite")).expect("db pool");
    let strategies = StrategyService::new(pool.clone());
    let strategy = strategies
        .create_strategy(StrategyCreateInput {
            name: "Revenue 2025".into(),
            year: 2025,
            status: None,
        })
        .expect("strategy");
    let csf = strategies
        .create_csf(CsfCreateInput {
            strategy_id: strategy.id,
            name: "Sales growth".into(),
            dimension: BscDimension::Financial,
            weight: Some(40.0),
        })
        .expect("csf");

    Fixture {
        kpis: KpiService::new(pool.clone(), Tz::UTC),
        snapshots: Arc::new(SnapshotService::new(pool.clone(), Tz::UTC)),
        pool,
        csf_id: csf.id,
        _dir: dir,
    }
}

fn http_source(url: String, pointer: &str) -> DataSourceConfig {
    DataSourceConfig::HttpJson(HttpJsonSource {
        url,
        value_pointer: pointer.to_string(),
        headers: BTreeMap::new(),
    })
}

#[tokio::test]
async fn http_source_value_is_recorded_as_automatic_snapshot() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/revenue")
                .header("x-api-key", "secret-key");
            then.status(200)
                .json_body(json!({"data": {"total": 1250.5, "currency": "EUR"}}));
        })
        .await;

    let fx = setup();
    let mut headers = BTreeMap::new();
    headers.insert("x-api-key".to_string(), "secret-key".to_string());
    let kpi = fx.create_kpi(
        "Monthly revenue",
        1000.0,
        Some(DataSourceConfig::HttpJson(HttpJsonSource {
            url: server.url("/api/revenue"),
            value_pointer: "/data/total".into(),
            headers,
        })),
    );

    let service = fx.default_service(5_000);
    let snapshot = service
        .collect_kpi(&kpi.id)
        .await
        .expect("collect")
        .expect("snapshot");

    mock.assert_async().await;
    assert_eq!(snapshot.value, Some(1250.5));
    assert_eq!(snapshot.source_type, SnapshotSource::Automatic);
    let rate = snapshot.completion_rate.expect("rate");
    assert!((rate - 125.05).abs() < 1e-9);

    let stored = fx.kpis.get_kpi(&kpi.id).expect("kpi");
    assert_eq!(stored.current_value, Some(1250.5));
    assert!(stored.last_collected_at.is_some());
}

#[tokio::test]
async fn sql_source_reads_from_the_store() {
    let fx = setup();
    let kpi = fx.create_kpi(
        "Tracked strategies",
        2.0,
        Some(DataSourceConfig::SqlQuery(SqlQuerySource {
            query: "SELECT COUNT(*) AS total FROM strategies;".into(),
            column: Some("total".into()),
        })),
    );

    let snapshot = fx
        .default_service(5_000)
        .collect_kpi(&kpi.id)
        .await
        .expect("collect")
        .expect("snapshot");

    assert_eq!(snapshot.value, Some(1.0));
    assert_eq!(snapshot.completion_rate, Some(50.0));
}

#[tokio::test]
async fn manual_and_unconfigured_kpis_are_not_collected() {
    let fx = setup();
    let manual = fx.create_kpi("Survey score", 80.0, Some(DataSourceConfig::Manual));
    let bare = fx.create_kpi("Board rating", 5.0, None);
    let service = fx.default_service(5_000);

    assert!(service.collect_kpi(&manual.id).await.expect("collect").is_none());
    assert!(service.collect_kpi(&bare.id).await.expect("collect").is_none());
    assert!(service.collect_kpi("no-such-kpi").await.expect("collect").is_none());
    assert_eq!(fx.kpis.get_kpi(&manual.id).expect("kpi").current_value, None);
}

#[tokio::test]
async fn collect_all_continues_past_failures() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/ok");
            then.status(200).json_body(json!({"value": "42"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/broken");
            then.status(503).body("maintenance");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/empty");
            then.status(200).json_body(json!({"value": null}));
        })
        .await;

    let fx = setup();
    let ok = fx.create_kpi("Healthy feed", 40.0, Some(http_source(server.url("/ok"), "/value")));
    let broken = fx.create_kpi("Broken feed", 40.0, Some(http_source(server.url("/broken"), "/value")));
    fx.create_kpi("Empty feed", 40.0, Some(http_source(server.url("/empty"), "/value")));
    fx.create_kpi("Manual entry", 40.0, Some(DataSourceConfig::Manual));
    fx.create_kpi("No source", 40.0, None);

    let summary = fx.default_service(5_000).collect_all().await.expect("collect all");
    assert_eq!(
        summary,
        CollectionSummary {
            collected: 1,
            skipped: 2,
            failed: 1,
        }
    );

    assert_eq!(fx.kpis.get_kpi(&ok.id).expect("kpi").current_value, Some(42.0));
    assert_eq!(fx.kpis.get_kpi(&broken.id).expect("kpi").current_value, None);
}

#[tokio::test]
async fn upstream_errors_carry_collector_codes() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/down");
            then.status(500);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/text");
            then.status(200).json_body(json!({"value": "about ten"}));
        })
        .await;

    let fx = setup();
    let service = fx.default_service(5_000);

    let down = fx.create_kpi("Down", 1.0, Some(http_source(server.url("/down"), "/value")));
    let err = service.collect_kpi(&down.id).await.unwrap_err();
    assert_eq!(err.collector_code(), Some(CollectorErrorCode::SourceUnavailable));

    let text = fx.create_kpi("Text", 1.0, Some(http_source(server.url("/text"), "/value")));
    let err = service.collect_kpi(&text.id).await.unwrap_err();
    assert_eq!(err.collector_code(), Some(CollectorErrorCode::InvalidPayload));

    let missing = fx.create_kpi("Missing", 1.0, Some(http_source(server.url("/text"), "/other")));
    let err = service.collect_kpi(&missing.id).await.unwrap_err();
    assert_eq!(err.collector_code(), Some(CollectorErrorCode::InvalidPayload));
}

#[tokio::test]
async fn slow_source_times_out() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/slow");
            then.status(200)
                .delay(Duration::from_secs(3))
                .json_body(json!({"value": 1}));
        })
        .await;

    let fx = setup();
    let kpi = fx.create_kpi("Slow", 1.0, Some(http_source(server.url("/slow"), "/value")));
    let err = fx.default_service(200).collect_kpi(&kpi.id).await.unwrap_err();

    assert_eq!(err.collector_code(), Some(CollectorErrorCode::Timeout));
    assert_eq!(fx.kpis.get_kpi(&kpi.id).expect("kpi").current_value, None);
}

#[tokio::test]
async fn unregistered_kind_fails_at_dispatch() {
    let fx = setup();
    let kpi = fx.create_kpi(
        "Orphan source",
        1.0,
        Some(DataSourceConfig::SqlQuery(SqlQuerySource {
            query: "SELECT 1".into(),
            column: None,
        })),
    );

    let err = fx
        .service(CollectorRegistry::new())
        .collect_kpi(&kpi.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Collector {
            code: CollectorErrorCode::NotRegistered,
            ..
        }
    ));
}

#[test]
fn invalid_data_source_is_refused_when_set() {
    let fx = setup();
    let kpi = fx.create_kpi("Plain", 1.0, None);

    let err = fx
        .kpis
        .set_data_source(
            &kpi.id,
            Some(DataSourceConfig::SqlQuery(SqlQuerySource {
                query: "DELETE FROM kpis".into(),
                column: None,
            })),
        )
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let updated = fx
        .kpis
        .set_data_source(&kpi.id, Some(http_source("https://erp.local/api".into(), "/total")))
        .expect("set source");
    assert!(matches!(updated.data_source, Some(DataSourceConfig::HttpJson(_))));

    let cleared = fx.kpis.set_data_source(&kpi.id, None).expect("clear source");
    assert_eq!(cleared.data_source, None);
}

#[tokio::test]
async fn unreadable_stored_config_counts_as_failed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/ok");
            then.status(200).json_body(json!({"value": 12}));
        })
        .await;

    let fx = setup();
    let ok = fx.create_kpi("Healthy feed", 10.0, Some(http_source(server.url("/ok"), "/value")));
    let corrupt = fx.create_kpi("Legacy feed", 10.0, None);
    fx.pool
        .with_connection(|conn| {
            conn.execute(
                "UPDATE kpis SET data_source_config = '{\"type\":\"ftp\"}' WHERE id = ?1",
                [&corrupt.id],
            )?;
            Ok(())
        })
        .expect("corrupt config");

    let service = fx.default_service(5_000);
    let summary = service.collect_all().await.expect("collect all");
    assert_eq!(
        summary,
        CollectionSummary {
            collected: 1,
            skipped: 0,
            failed: 1,
        }
    );
    assert_eq!(fx.kpis.get_kpi(&ok.id).expect("kpi").current_value, Some(12.0));

    let err = service.collect_kpi(&corrupt.id).await.unwrap_err();
    assert!(matches!(err, AppError::Serialization(_)));
    assert_eq!(fx.kpis.get_kpi(&corrupt.id).expect("kpi").current_value, None);
}
