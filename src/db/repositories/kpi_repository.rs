use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::models::data_source::DataSourceConfig;
use crate::models::kpi::{KpiDirection, KpiRecord, UpdateFrequency};

const BASE_SELECT: &str = r#"
    SELECT
        id,
        csf_id,
        name,
        unit,
        direction,
        target_value,
        current_value,
        weight,
        frequency,
        is_active,
        data_source_config,
        last_collected_at,
        created_at,
        updated_at
    FROM kpis
"#;

#[derive(Debug, Clone)]
pub struct KpiRow {
    pub id: String,
    pub csf_id: String,
    pub name: String,
    pub unit: Option<String>,
    pub direction: String,
    pub target_value: Option<f64>,
    pub current_value: Option<f64>,
    pub weight: Option<f64>,
    pub frequency: String,
    pub is_active: bool,
    pub data_source_config: Option<String>,
    pub last_collected_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl KpiRow {
    pub fn from_record(record: &KpiRecord) -> AppResult<Self> {
        Ok(Self {
            id: record.id.clone(),
            csf_id: record.csf_id.clone(),
            name: record.name.clone(),
            unit: record.unit.clone(),
            direction: record.direction.as_str().to_string(),
            target_value: record.target_value,
            current_value: record.current_value,
            weight: record.weight,
            frequency: record.frequency.as_str().to_string(),
            is_active: record.is_active,
            data_source_config: serialize_data_source(record.data_source.as_ref())?,
            last_collected_at: record.last_collected_at.clone(),
            created_at: record.created_at.clone(),
            updated_at: record.updated_at.clone(),
        })
    }

    /// Scoring reads never depend on the collector column: a stored config
    /// that no longer decodes is logged and read back as `None`.
    pub fn into_record(self) -> AppResult<KpiRecord> {
        let collectable = self.into_collectable()?;
        if let Err(err) = &collectable.data_source {
            warn!(
                target: "app::db",
                kpi_id = %collectable.kpi.id,
                error = %err,
                "stored data source config is unreadable, ignoring it"
            );
        }
        Ok(collectable.kpi)
    }

    pub fn into_collectable(mut self) -> AppResult<CollectableKpi> {
        let data_source = deserialize_data_source(self.data_source_config.take());
        let direction = KpiDirection::from_str(&self.direction).map_err(AppError::database)?;
        let kpi = KpiRecord {
            id: self.id,
            csf_id: self.csf_id,
            name: self.name,
            unit: self.unit,
            direction,
            target_value: self.target_value,
            current_value: self.current_value,
            weight: self.weight,
            frequency: UpdateFrequency::parse_lenient(&self.frequency),
            is_active: self.is_active,
            data_source: data_source.as_ref().ok().cloned().flatten(),
            last_collected_at: self.last_collected_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        Ok(CollectableKpi { kpi, data_source })
    }
}

/// A KPI together with the strict decode of its stored data source.
#[derive(Debug)]
pub struct CollectableKpi {
    pub kpi: KpiRecord,
    pub data_source: AppResult<Option<DataSourceConfig>>,
}

impl TryFrom<&Row<'_>> for KpiRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            csf_id: row.get("csf_id")?,
            name: row.get("name")?,
            unit: row.get("unit")?,
            direction: row.get("direction")?,
            target_value: row.get("target_value")?,
            current_value: row.get("current_value")?,
            weight: row.get("weight")?,
            frequency: row.get("frequency")?,
            is_active: row.get("is_active")?,
            data_source_config: row.get("data_source_config")?,
            last_collected_at: row.get("last_collected_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct KpiRepository;

impl KpiRepository {
    pub fn insert(conn: &Connection, row: &KpiRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO kpis (
                    id,
                    csf_id,
                    name,
                    unit,
                    direction,
                    target_value,
                    current_value,
                    weight,
                    frequency,
                    is_active,
                    data_source_config,
                    last_collected_at,
                    created_at,
                    updated_at
                ) VALUES (
                    :id,
                    :csf_id,
                    :name,
                    :unit,
                    :direction,
                    :target_value,
                    :current_value,
                    :weight,
                    :frequency,
                    :is_active,
                    :data_source_config,
                    :last_collected_at,
                    :created_at,
                    :updated_at
                )
            "#,
            named_params! {
                ":id": &row.id,
                ":csf_id": &row.csf_id,
                ":name": &row.name,
                ":unit": &row.unit,
                ":direction": &row.direction,
                ":target_value": &row.target_value,
                ":current_value": &row.current_value,
                ":weight": &row.weight,
                ":frequency": &row.frequency,
                ":is_active": &row.is_active,
                ":data_source_config": &row.data_source_config,
                ":last_collected_at": &row.last_collected_at,
                ":created_at": &row.created_at,
                ":updated_at": &row.updated_at,
            },
        )?;

        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<KpiRecord>> {
        let sql = format!("{BASE_SELECT} WHERE id = :id");
        let row = conn
            .query_row(&sql, named_params! {":id": id}, |row| KpiRow::try_from(row))
            .optional()?;

        row.map(|row| row.into_record()).transpose()
    }

    pub fn find_active_by_id(conn: &Connection, id: &str) -> AppResult<Option<KpiRecord>> {
        Ok(Self::find_by_id(conn, id)?.filter(|kpi| kpi.is_active))
    }

    pub fn list_active_by_csf(conn: &Connection, csf_id: &str) -> AppResult<Vec<KpiRecord>> {
        let sql = format!(
            "{BASE_SELECT} WHERE csf_id = :csf_id AND is_active = 1 ORDER BY created_at, rowid"
        );
        Self::query_list(conn, &sql, named_params! {":csf_id": csf_id})
    }

    pub fn find_active_collectable(
        conn: &Connection,
        id: &str,
    ) -> AppResult<Option<CollectableKpi>> {
        let sql = format!("{BASE_SELECT} WHERE id = :id AND is_active = 1");
        let row = conn
            .query_row(&sql, named_params! {":id": id}, |row| KpiRow::try_from(row))
            .optional()?;

        row.map(KpiRow::into_collectable).transpose()
    }

    /// Active KPIs with a stored config. Undecodable configs come back as a
    /// per-KPI error instead of failing the whole list.
    pub fn list_active_with_data_source(conn: &Connection) -> AppResult<Vec<CollectableKpi>> {
        let sql = format!(
            "{BASE_SELECT} WHERE is_active = 1 AND data_source_config IS NOT NULL ORDER BY created_at, rowid"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| KpiRow::try_from(row))?
            .map(|row| row.map_err(AppError::from).and_then(KpiRow::into_collectable))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(rows)
    }

    /// Writes the new value and collection time; returns the number of rows changed.
    pub fn update_current_value(
        conn: &Connection,
        id: &str,
        value: Option<f64>,
        collected_at: &str,
    ) -> AppResult<usize> {
        let changed = conn.execute(
            r#"
                UPDATE kpis
                SET current_value = :value,
                    last_collected_at = :collected_at,
                    updated_at = :collected_at
                WHERE id = :id AND is_active = 1
            "#,
            named_params! {
                ":id": id,
                ":value": &value,
                ":collected_at": collected_at,
            },
        )?;
        Ok(changed)
    }

    pub fn update_target(
        conn: &Connection,
        id: &str,
        target_value: Option<f64>,
        updated_at: &str,
    ) -> AppResult<usize> {
        let changed = conn.execute(
            "UPDATE kpis SET target_value = :target_value, updated_at = :updated_at WHERE id = :id AND is_active = 1",
            named_params! {
                ":id": id,
                ":target_value": &target_value,
                ":updated_at": updated_at,
            },
        )?;
        Ok(changed)
    }

    pub fn update_data_source(
        conn: &Connection,
        id: &str,
        data_source: Option<&DataSourceConfig>,
        updated_at: &str,
    ) -> AppResult<usize> {
        let serialized = serialize_data_source(data_source)?;
        let changed = conn.execute(
            "UPDATE kpis SET data_source_config = :config, updated_at = :updated_at WHERE id = :id AND is_active = 1",
            named_params! {
                ":id": id,
                ":config": &serialized,
                ":updated_at": updated_at,
            },
        )?;
        Ok(changed)
    }

    pub fn deactivate(conn: &Connection, id: &str, updated_at: &str) -> AppResult<usize> {
        let changed = conn.execute(
            "UPDATE kpis SET is_active = 0, updated_at = :updated_at WHERE id = :id AND is_active = 1",
            named_params! {":id": id, ":updated_at": updated_at},
        )?;
        Ok(changed)
    }

    fn query_list(
        conn: &Connection,
        sql: &str,
        params: &[(&str, &dyn rusqlite::ToSql)],
    ) -> AppResult<Vec<KpiRecord>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, |row| KpiRow::try_from(row))?
            .map(|row| row.map_err(AppError::from).and_then(|row| row.into_record()))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(rows)
    }
}

fn serialize_data_source(config: Option<&DataSourceConfig>) -> AppResult<Option<String>> {
    config.map(|config| config.to_json()).transpose()
}

fn deserialize_data_source(raw: Option<String>) -> AppResult<Option<DataSourceConfig>> {
    match raw {
        Some(text) if !text.trim().is_empty() => Ok(Some(DataSourceConfig::from_json(&text)?)),
        _ => Ok(None),
    }
}
