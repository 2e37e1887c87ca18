use std::convert::TryFrom;

use rusqlite::{named_params, Connection, Row};

use crate::error::{AppError, AppResult};
use crate::models::health::HealthLevel;
use crate::models::snapshot::{KpiSnapshotRecord, SnapshotSource};

#[derive(Debug, Clone)]
pub struct KpiSnapshotRow {
    pub id: String,
    pub kpi_id: String,
    pub snapshot_date: String,
    pub period_key: String,
    pub value: Option<f64>,
    pub target_value: Option<f64>,
    pub completion_rate: Option<f64>,
    pub health_level: Option<String>,
    pub source_type: String,
    pub recorded_by: Option<String>,
    pub remark: Option<String>,
    pub created_at: String,
}

impl KpiSnapshotRow {
    pub fn from_record(record: &KpiSnapshotRecord) -> Self {
        Self {
            id: record.id.clone(),
            kpi_id: record.kpi_id.clone(),
            snapshot_date: record.snapshot_date.clone(),
            period_key: record.period_key.clone(),
            value: record.value,
            target_value: record.target_value,
            completion_rate: record.completion_rate,
            health_level: record.health_level.map(|level| level.as_str().to_string()),
            source_type: record.source_type.as_str().to_string(),
            recorded_by: normalize_text(record.recorded_by.as_deref()),
            remark: normalize_text(record.remark.as_deref()),
            created_at: record.created_at.clone(),
        }
    }

    pub fn into_record(self) -> AppResult<KpiSnapshotRecord> {
        let health_level = self
            .health_level
            .as_deref()
            .map(HealthLevel::from_str)
            .transpose()
            .map_err(AppError::database)?;
        let source_type =
            SnapshotSource::from_str(&self.source_type).map_err(AppError::database)?;

        Ok(KpiSnapshotRecord {
            id: self.id,
            kpi_id: self.kpi_id,
            snapshot_date: self.snapshot_date,
            period_key: self.period_key,
            value: self.value,
            target_value: self.target_value,
            completion_rate: self.completion_rate,
            health_level,
            source_type,
            recorded_by: self.recorded_by,
            remark: self.remark,
            created_at: self.created_at,
        })
    }
}

impl TryFrom<&Row<'_>> for KpiSnapshotRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            kpi_id: row.get("kpi_id")?,
            snapshot_date: row.get("snapshot_date")?,
            period_key: row.get("period_key")?,
            value: row.get("value")?,
            target_value: row.get("target_value")?,
            completion_rate: row.get("completion_rate")?,
            health_level: row.get("health_level")?,
            source_type: row.get("source_type")?,
            recorded_by: row.get("recorded_by")?,
            remark: row.get("remark")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub struct SnapshotRepository;

impl SnapshotRepository {
    pub fn insert(conn: &Connection, row: &KpiSnapshotRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO kpi_snapshots (
                    id,
                    kpi_id,
                    snapshot_date,
                    period_key,
                    value,
                    target_value,
                    completion_rate,
                    health_level,
                    source_type,
                    recorded_by,
                    remark,
                    created_at
                ) VALUES (
                    :id,
                    :kpi_id,
                    :snapshot_date,
                    :period_key,
                    :value,
                    :target_value,
                    :completion_rate,
                    :health_level,
                    :source_type,
                    :recorded_by,
                    :remark,
                    :created_at
                )
            "#,
            named_params! {
                ":id": &row.id,
                ":kpi_id": &row.kpi_id,
                ":snapshot_date": &row.snapshot_date,
                ":period_key": &row.period_key,
                ":value": &row.value,
                ":target_value": &row.target_value,
                ":completion_rate": &row.completion_rate,
                ":health_level": &row.health_level,
                ":source_type": &row.source_type,
                ":recorded_by": &row.recorded_by,
                ":remark": &row.remark,
                ":created_at": &row.created_at,
            },
        )?;

        Ok(())
    }

    /// Newest first: by snapshot date, then creation time, then insertion order.
    pub fn list_recent_for_kpi(
        conn: &Connection,
        kpi_id: &str,
        limit: usize,
    ) -> AppResult<Vec<KpiSnapshotRecord>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT
                    id,
                    kpi_id,
                    snapshot_date,
                    period_key,
                    value,
                    target_value,
                    completion_rate,
                    health_level,
                    source_type,
                    recorded_by,
                    remark,
                    created_at
                FROM kpi_snapshots
                WHERE kpi_id = :kpi_id
                ORDER BY snapshot_date DESC, created_at DESC, rowid DESC
                LIMIT :limit
            "#,
        )?;

        let rows = stmt
            .query_map(
                named_params! {":kpi_id": kpi_id, ":limit": limit as i64},
                |row| KpiSnapshotRow::try_from(row),
            )?
            .map(|row| {
                row.map_err(AppError::from)
                    .and_then(|row| row.into_record())
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(rows)
    }

    pub fn count_for_kpi(conn: &Connection, kpi_id: &str) -> AppResult<usize> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM kpi_snapshots WHERE kpi_id = :kpi_id",
            named_params! {":kpi_id": kpi_id},
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn normalize_text(value: Option<&str>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
