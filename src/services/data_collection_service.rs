use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db::repositories::kpi_repository::KpiRepository;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::data_source::DataSourceConfig;
use crate::models::kpi::KpiRecord;
use crate::models::snapshot::{KpiSnapshotRecord, SnapshotContext};
use crate::services::collector_registry::CollectorRegistry;
use crate::services::snapshot_service::SnapshotService;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    pub collected: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Pulls KPI values from their configured sources and records them as
/// automatic snapshots.
pub struct DataCollectionService {
    db: DbPool,
    registry: Arc<CollectorRegistry>,
    snapshots: Arc<SnapshotService>,
}

impl DataCollectionService {
    pub fn new(
        db: DbPool,
        registry: Arc<CollectorRegistry>,
        snapshots: Arc<SnapshotService>,
    ) -> Self {
        Self {
            db,
            registry,
            snapshots,
        }
    }

    /// Collects one KPI. `Ok(None)` when it is missing, inactive, manual or
    /// the source had no value. A stored config that fails to decode is an error.
    pub async fn collect_kpi(&self, kpi_id: &str) -> AppResult<Option<KpiSnapshotRecord>> {
        let found = self
            .db
            .with_connection(|conn| KpiRepository::find_active_collectable(conn, kpi_id))?;
        match found {
            Some(found) => {
                let config = found.data_source?;
                self.collect_record(&found.kpi, config.as_ref()).await
            }
            None => {
                debug!(target: "app::collector", kpi_id, "kpi missing or inactive, collection skipped");
                Ok(None)
            }
        }
    }

    /// Runs every active KPI with a data source; one failure does not stop the rest.
    pub async fn collect_all(&self) -> AppResult<CollectionSummary> {
        let kpis = self
            .db
            .with_connection(KpiRepository::list_active_with_data_source)?;

        let mut summary = CollectionSummary::default();
        for found in kpis {
            let kpi = &found.kpi;
            let outcome = match found.data_source {
                Ok(config) => self.collect_record(kpi, config.as_ref()).await,
                Err(err) => Err(err),
            };
            match outcome {
                Ok(Some(_)) => summary.collected += 1,
                Ok(None) => summary.skipped += 1,
                Err(err) => {
                    warn!(target: "app::collector", kpi_id = %kpi.id, error = %err, "kpi collection failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            target: "app::collector",
            collected = summary.collected,
            skipped = summary.skipped,
            failed = summary.failed,
            "collection run finished"
        );
        Ok(summary)
    }

    async fn collect_record(
        &self,
        kpi: &KpiRecord,
        config: Option<&DataSourceConfig>,
    ) -> AppResult<Option<KpiSnapshotRecord>> {
        let Some(config) = config else {
            return Ok(None);
        };
        if config.collector_kind().is_none() {
            return Ok(None);
        }

        let Some(value) = self.registry.collect(kpi, config).await? else {
            debug!(target: "app::collector", kpi_id = %kpi.id, "source returned no value");
            return Ok(None);
        };

        self.snapshots
            .update_kpi_value(&kpi.id, Some(value), SnapshotContext::automatic())
    }
}
