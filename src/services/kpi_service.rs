use std::ops::Deref;

use chrono::{SecondsFormat, Utc};
use chrono_tz::Tz;
use rusqlite::TransactionBehavior;
use tracing::info;
use uuid::Uuid;

use crate::db::repositories::csf_repository::CsfRepository;
use crate::db::repositories::kpi_repository::{KpiRepository, KpiRow};
use crate::db::repositories::snapshot_repository::{KpiSnapshotRow, SnapshotRepository};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::data_source::DataSourceConfig;
use crate::models::kpi::{KpiCreateInput, KpiRecord};
use crate::models::snapshot::SnapshotContext;
use crate::services::snapshot_service::build_snapshot;
use crate::services::strategy_service::ensure_valid_weight;

pub struct KpiService {
    db: DbPool,
    timezone: Tz,
}

impl KpiService {
    /// `timezone` dates the snapshot written for an initial value.
    pub fn new(db: DbPool, timezone: Tz) -> Self {
        Self { db, timezone }
    }

    /// Creates the KPI. An initial `current_value` is recorded as the first
    /// manual snapshot in the same transaction as the insert.
    pub fn create_kpi(&self, input: KpiCreateInput) -> AppResult<KpiRecord> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::validation("KPI 名称不能为空"));
        }
        ensure_finite("targetValue", input.target_value)?;
        ensure_finite("currentValue", input.current_value)?;
        ensure_valid_weight(input.weight)?;
        if let Some(config) = input.data_source.as_ref() {
            config.validate()?;
        }

        let created_at = Utc::now();
        let now = created_at.to_rfc3339();
        let record = KpiRecord {
            id: Uuid::new_v4().to_string(),
            csf_id: input.csf_id,
            name,
            unit: input
                .unit
                .map(|unit| unit.trim().to_string())
                .filter(|unit| !unit.is_empty()),
            direction: input.direction,
            target_value: input.target_value,
            current_value: input.current_value,
            weight: input.weight,
            frequency: input.frequency,
            is_active: true,
            data_source: input.data_source,
            last_collected_at: input
                .current_value
                .map(|_| created_at.to_rfc3339_opts(SecondsFormat::Micros, true)),
            created_at: now.clone(),
            updated_at: now,
        };

        let row = KpiRow::from_record(&record)?;
        let mut conn = self.db.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let tx_conn = tx.deref();

        match CsfRepository::find_by_id(tx_conn, &record.csf_id)? {
            Some(csf) if csf.is_active => {}
            _ => {
                return Err(AppError::validation(format!(
                    "CSF not found or inactive: {}",
                    record.csf_id
                )))
            }
        }
        KpiRepository::insert(tx_conn, &row)?;

        let initial = match record.current_value {
            Some(_) => {
                let context = SnapshotContext::manual(None, None);
                let snapshot = build_snapshot(&record, &context, created_at, self.timezone);
                SnapshotRepository::insert(tx_conn, &KpiSnapshotRow::from_record(&snapshot))?;
                Some(snapshot.id)
            }
            None => None,
        };

        tx.commit()?;

        info!(
            target: "app::kpi",
            kpi_id = %record.id,
            csf_id = %record.csf_id,
            initial_snapshot = ?initial,
            "kpi created"
        );
        Ok(record)
    }

    pub fn get_kpi(&self, id: &str) -> AppResult<KpiRecord> {
        self.db
            .with_connection(|conn| KpiRepository::find_by_id(conn, id))?
            .ok_or_else(AppError::not_found)
    }

    pub fn list_active_kpis(&self, csf_id: &str) -> AppResult<Vec<KpiRecord>> {
        self.db
            .with_connection(|conn| KpiRepository::list_active_by_csf(conn, csf_id))
    }

    /// Changing the target does not write a snapshot; only value changes do.
    pub fn update_target(&self, id: &str, target_value: Option<f64>) -> AppResult<KpiRecord> {
        ensure_finite("targetValue", target_value)?;
        let now = Utc::now().to_rfc3339();
        let changed = self
            .db
            .with_connection(|conn| KpiRepository::update_target(conn, id, target_value, &now))?;
        if changed == 0 {
            return Err(AppError::not_found());
        }
        self.get_kpi(id)
    }

    pub fn set_data_source(
        &self,
        id: &str,
        data_source: Option<DataSourceConfig>,
    ) -> AppResult<KpiRecord> {
        if let Some(config) = data_source.as_ref() {
            config.validate()?;
        }
        let now = Utc::now().to_rfc3339();
        let changed = self.db.with_connection(|conn| {
            KpiRepository::update_data_source(conn, id, data_source.as_ref(), &now)
        })?;
        if changed == 0 {
            return Err(AppError::not_found());
        }
        info!(
            target: "app::kpi",
            kpi_id = id,
            kind = ?data_source.as_ref().and_then(|config| config.collector_kind()),
            "kpi data source updated"
        );
        self.get_kpi(id)
    }

    /// Soft delete; snapshot history is retained.
    pub fn deactivate_kpi(&self, id: &str) -> AppResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self
            .db
            .with_connection(|conn| KpiRepository::deactivate(conn, id, &now))?;
        if changed == 0 {
            return Err(AppError::not_found());
        }
        info!(target: "app::kpi", kpi_id = id, "kpi deactivated");
        Ok(())
    }
}

fn ensure_finite(field: &str, value: Option<f64>) -> AppResult<()> {
    match value {
        Some(value) if !value.is_finite() => Err(AppError::validation_with_details(
            "数值必须是有限数字",
            serde_json::json!({ "field": field }),
        )),
        _ => Ok(()),
    }
}
