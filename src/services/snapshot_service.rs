use std::ops::Deref;

use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use rusqlite::TransactionBehavior;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::repositories::kpi_repository::KpiRepository;
use crate::db::repositories::snapshot_repository::{KpiSnapshotRow, SnapshotRepository};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::health::Trend;
use crate::models::kpi::KpiRecord;
use crate::models::snapshot::{KpiSnapshotRecord, SnapshotContext};
use crate::services::health_calculator::{completion_rate, infer_trend, snapshot_health_level};
use crate::services::period_utils::{local_date, period_key};

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Append-only KPI history.
///
/// Each call writes a new row; nothing here edits or deletes snapshots.
/// Two callers updating the same KPI concurrently both succeed and the last
/// value written wins.
pub struct SnapshotService {
    db: DbPool,
    timezone: Tz,
}

impl SnapshotService {
    pub fn new(db: DbPool, timezone: Tz) -> Self {
        Self { db, timezone }
    }

    /// Snapshot the KPI's current state without changing it.
    ///
    /// Returns `Ok(None)` when the KPI is missing or inactive.
    pub fn record_snapshot(
        &self,
        kpi_id: &str,
        context: SnapshotContext,
    ) -> AppResult<Option<KpiSnapshotRecord>> {
        self.db.with_connection(|conn| {
            let Some(kpi) = KpiRepository::find_active_by_id(conn, kpi_id)? else {
                debug!(target: "app::snapshot", kpi_id, "kpi missing or inactive, snapshot skipped");
                return Ok(None);
            };

            let recorded_at = context.recorded_at.unwrap_or_else(Utc::now);
            let snapshot = build_snapshot(&kpi, &context, recorded_at, self.timezone);
            SnapshotRepository::insert(conn, &KpiSnapshotRow::from_record(&snapshot))?;

            info!(
                target: "app::snapshot",
                kpi_id,
                snapshot_id = %snapshot.id,
                period_key = %snapshot.period_key,
                "kpi snapshot recorded"
            );
            Ok(Some(snapshot))
        })
    }

    /// Set the KPI's current value and record the matching snapshot in one transaction.
    ///
    /// Returns `Ok(None)` without writing when the KPI is missing or inactive.
    /// Any storage failure rolls back both writes and is returned as an error.
    pub fn update_kpi_value(
        &self,
        kpi_id: &str,
        value: Option<f64>,
        context: SnapshotContext,
    ) -> AppResult<Option<KpiSnapshotRecord>> {
        if let Some(value) = value {
            if !value.is_finite() {
                return Err(AppError::validation_with_details(
                    "KPI 数值必须是有限数字",
                    serde_json::json!({ "kpiId": kpi_id }),
                ));
            }
        }

        let mut conn = self.db.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let tx_conn = tx.deref();

        let Some(mut kpi) = KpiRepository::find_active_by_id(tx_conn, kpi_id)? else {
            debug!(target: "app::snapshot", kpi_id, "kpi missing or inactive, value update skipped");
            return Ok(None);
        };

        let recorded_at = context.recorded_at.unwrap_or_else(Utc::now);
        let collected_at = recorded_at.to_rfc3339_opts(SecondsFormat::Micros, true);
        let changed = KpiRepository::update_current_value(tx_conn, kpi_id, value, &collected_at)?;
        if changed != 1 {
            return Err(AppError::conflict(format!(
                "KPI 数值更新失败: {kpi_id}"
            )));
        }

        kpi.current_value = value;
        kpi.last_collected_at = Some(collected_at);

        let snapshot = build_snapshot(&kpi, &context, recorded_at, self.timezone);
        SnapshotRepository::insert(tx_conn, &KpiSnapshotRow::from_record(&snapshot))?;

        tx.commit()?;

        info!(
            target: "app::snapshot",
            kpi_id,
            snapshot_id = %snapshot.id,
            source = snapshot.source_type.as_str(),
            value = ?value,
            "kpi value updated"
        );
        Ok(Some(snapshot))
    }

    /// Newest first.
    pub fn list_history(&self, kpi_id: &str, limit: usize) -> AppResult<Vec<KpiSnapshotRecord>> {
        self.db
            .with_connection(|conn| SnapshotRepository::list_recent_for_kpi(conn, kpi_id, limit))
    }

    /// Compares the two most recent snapshots; `None` without two usable values.
    pub fn kpi_trend(&self, kpi_id: &str) -> AppResult<Option<Trend>> {
        let recent = self.list_history(kpi_id, 2)?;
        match recent.as_slice() {
            [newest, previous] => Ok(infer_trend(newest.value, previous.value)),
            _ => Ok(None),
        }
    }
}

pub(crate) fn build_snapshot(
    kpi: &KpiRecord,
    context: &SnapshotContext,
    recorded_at: DateTime<Utc>,
    timezone: Tz,
) -> KpiSnapshotRecord {
    let rate = completion_rate(kpi.current_value, kpi.target_value, kpi.direction);
    let date = local_date(recorded_at, timezone);

    KpiSnapshotRecord {
        id: Uuid::new_v4().to_string(),
        kpi_id: kpi.id.clone(),
        snapshot_date: date.format("%Y-%m-%d").to_string(),
        period_key: period_key(kpi.frequency, date),
        value: kpi.current_value,
        target_value: kpi.target_value,
        completion_rate: rate,
        health_level: snapshot_health_level(rate),
        source_type: context.source_type,
        recorded_by: context.recorded_by.clone(),
        remark: context.remark.clone(),
        created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
    }
}
