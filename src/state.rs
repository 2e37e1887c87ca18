use std::sync::Arc;

use tracing::info;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::services::collector_registry::CollectorRegistry;
use crate::services::data_collection_service::DataCollectionService;
use crate::services::health_service::HealthService;
use crate::services::kpi_service::KpiService;
use crate::services::snapshot_service::SnapshotService;
use crate::services::strategy_service::StrategyService;

/// Wired services sharing one database pool.
#[derive(Clone)]
pub struct AppState {
    db: DbPool,
    strategies: Arc<StrategyService>,
    kpis: Arc<KpiService>,
    health: Arc<HealthService>,
    snapshots: Arc<SnapshotService>,
    collection: Arc<DataCollectionService>,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;
        let timezone = config.reporting.tz()?;
        let db = DbPool::new(config.database.path.clone())?;

        let registry = Arc::new(CollectorRegistry::with_defaults(
            db.clone(),
            config.collection.timeout_ms,
        )?);
        let state = Self::with_registry(db, timezone, registry);

        info!(
            target: "app::state",
            db_path = %config.database.path.display(),
            timezone = %timezone,
            "application state ready"
        );
        Ok(state)
    }

    /// Wires the services around an existing pool and a caller-built registry.
    pub fn with_registry(
        db: DbPool,
        timezone: chrono_tz::Tz,
        registry: Arc<CollectorRegistry>,
    ) -> Self {
        let snapshots = Arc::new(SnapshotService::new(db.clone(), timezone));
        let collection = Arc::new(DataCollectionService::new(
            db.clone(),
            registry,
            Arc::clone(&snapshots),
        ));

        Self {
            strategies: Arc::new(StrategyService::new(db.clone())),
            kpis: Arc::new(KpiService::new(db.clone(), timezone)),
            health: Arc::new(HealthService::new(db.clone())),
            snapshots,
            collection,
            db,
        }
    }

    pub fn db(&self) -> &DbPool {
        &self.db
    }

    pub fn strategies(&self) -> Arc<StrategyService> {
        Arc::clone(&self.strategies)
    }

    pub fn kpis(&self) -> Arc<KpiService> {
        Arc::clone(&self.kpis)
    }

    pub fn health(&self) -> Arc<HealthService> {
        Arc::clone(&self.health)
    }

    pub fn snapshots(&self) -> Arc<SnapshotService> {
        Arc::clone(&self.snapshots)
    }

    pub fn collection(&self) -> Arc<DataCollectionService> {
        Arc::clone(&self.collection)
    }
}
