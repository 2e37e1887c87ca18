use std::collections::HashMap;
use std::sync::Arc;

use tokio::time::{timeout, Duration};
use tracing::{error, info};

use crate::collectors::{HttpJsonCollector, KpiCollector, SqlQueryCollector};
use crate::db::DbPool;
use crate::error::{AppError, AppResult, CollectorErrorCode};
use crate::models::data_source::{CollectorKind, DataSourceConfig};
use crate::models::kpi::KpiRecord;

pub const DEFAULT_COLLECTION_TIMEOUT_MS: u64 = 15_000;

/// Explicit map from collector kind to implementation.
///
/// Built once at startup; a kind with no registered collector fails at
/// dispatch time with `COLLECTOR_NOT_REGISTERED`.
pub struct CollectorRegistry {
    collectors: HashMap<CollectorKind, Arc<dyn KpiCollector>>,
    timeout_duration: Duration,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_COLLECTION_TIMEOUT_MS)
    }

    pub fn with_timeout(timeout_ms: u64) -> Self {
        Self {
            collectors: HashMap::new(),
            timeout_duration: Duration::from_millis(timeout_ms),
        }
    }

    /// Registry with the built-in SQL and HTTP collectors.
    pub fn with_defaults(db: DbPool, timeout_ms: u64) -> AppResult<Self> {
        let mut registry = Self::with_timeout(timeout_ms);
        registry.register(Arc::new(SqlQueryCollector::new(db)))?;
        registry.register(Arc::new(HttpJsonCollector::try_new(
            Duration::from_millis(timeout_ms),
        )?))?;
        Ok(registry)
    }

    pub fn register(&mut self, collector: Arc<dyn KpiCollector>) -> AppResult<()> {
        let kind = collector.kind();
        if self.collectors.contains_key(&kind) {
            return Err(AppError::conflict(format!(
                "Collector '{kind}' is already registered"
            )));
        }
        self.collectors.insert(kind, collector);
        info!(target: "app::collector", kind = %kind, "collector registered");
        Ok(())
    }

    pub fn has_collector(&self, kind: CollectorKind) -> bool {
        self.collectors.contains_key(&kind)
    }

    pub fn collector_count(&self) -> usize {
        self.collectors.len()
    }

    /// Dispatches to the collector for the config's kind under the registry timeout.
    ///
    /// Manual sources yield `Ok(None)` without touching any collector.
    pub async fn collect(
        &self,
        kpi: &KpiRecord,
        config: &DataSourceConfig,
    ) -> AppResult<Option<f64>> {
        let Some(kind) = config.collector_kind() else {
            return Ok(None);
        };

        let collector = self.collectors.get(&kind).ok_or_else(|| {
            AppError::collector(
                kind,
                CollectorErrorCode::NotRegistered,
                format!("未注册 {kind} 类型的采集器"),
            )
        })?;

        match timeout(self.timeout_duration, collector.collect(kpi, config)).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    target: "app::collector",
                    kind = %kind,
                    kpi_id = %kpi.id,
                    timeout_ms = ?self.timeout_duration.as_millis(),
                    "collector timed out"
                );
                Err(AppError::collector(
                    kind,
                    CollectorErrorCode::Timeout,
                    format!("采集超时（超过 {}ms）", self.timeout_duration.as_millis()),
                ))
            }
        }
    }
}

impl Default for CollectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
