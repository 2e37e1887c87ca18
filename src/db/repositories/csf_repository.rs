use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::strategy::{BscDimension, CsfRecord};

const BASE_SELECT: &str = r#"
    SELECT
        id,
        strategy_id,
        name,
        dimension,
        weight,
        is_active,
        created_at,
        updated_at
    FROM csfs
"#;

#[derive(Debug, Clone)]
pub struct CsfRow {
    pub id: String,
    pub strategy_id: String,
    pub name: String,
    pub dimension: String,
    pub weight: Option<f64>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl CsfRow {
    pub fn from_record(record: &CsfRecord) -> Self {
        Self {
            id: record.id.clone(),
            strategy_id: record.strategy_id.clone(),
            name: record.name.clone(),
            dimension: record.dimension.as_str().to_string(),
            weight: record.weight,
            is_active: record.is_active,
            created_at: record.created_at.clone(),
            updated_at: record.updated_at.clone(),
        }
    }

    pub fn into_record(self) -> AppResult<CsfRecord> {
        let dimension = BscDimension::from_str(&self.dimension).map_err(AppError::database)?;
        Ok(CsfRecord {
            id: self.id,
            strategy_id: self.strategy_id,
            name: self.name,
            dimension,
            weight: self.weight,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl TryFrom<&Row<'_>> for CsfRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            strategy_id: row.get("strategy_id")?,
            name: row.get("name")?,
            dimension: row.get("dimension")?,
            weight: row.get("weight")?,
            is_active: row.get("is_active")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct CsfRepository;

impl CsfRepository {
    pub fn insert(conn: &Connection, row: &CsfRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO csfs (
                    id, strategy_id, name, dimension, weight, is_active, created_at, updated_at
                ) VALUES (
                    :id, :strategy_id, :name, :dimension, :weight, :is_active, :created_at, :updated_at
                )
            "#,
            named_params! {
                ":id": &row.id,
                ":strategy_id": &row.strategy_id,
                ":name": &row.name,
                ":dimension": &row.dimension,
                ":weight": &row.weight,
                ":is_active": &row.is_active,
                ":created_at": &row.created_at,
                ":updated_at": &row.updated_at,
            },
        )?;

        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<CsfRecord>> {
        let sql = format!("{BASE_SELECT} WHERE id = :id");
        let row = conn
            .query_row(&sql, named_params! {":id": id}, |row| CsfRow::try_from(row))
            .optional()?;

        row.map(|row| row.into_record()).transpose()
    }

    pub fn list_active_by_strategy(
        conn: &Connection,
        strategy_id: &str,
    ) -> AppResult<Vec<CsfRecord>> {
        let sql = format!(
            "{BASE_SELECT} WHERE strategy_id = :strategy_id AND is_active = 1 ORDER BY created_at, rowid"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(named_params! {":strategy_id": strategy_id}, |row| {
                CsfRow::try_from(row)
            })?
            .map(|row| row.map_err(AppError::from).and_then(|row| row.into_record()))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(rows)
    }

    pub fn list_active_by_dimension(
        conn: &Connection,
        strategy_id: &str,
        dimension: BscDimension,
    ) -> AppResult<Vec<CsfRecord>> {
        let sql = format!(
            "{BASE_SELECT} WHERE strategy_id = :strategy_id AND dimension = :dimension AND is_active = 1 ORDER BY created_at, rowid"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                named_params! {
                    ":strategy_id": strategy_id,
                    ":dimension": dimension.as_str(),
                },
                |row| CsfRow::try_from(row),
            )?
            .map(|row| row.map_err(AppError::from).and_then(|row| row.into_record()))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(rows)
    }

    /// Returns the number of rows changed; zero when the CSF is missing or already inactive.
    pub fn deactivate(conn: &Connection, id: &str, updated_at: &str) -> AppResult<usize> {
        let changed = conn.execute(
            "UPDATE csfs SET is_active = 0, updated_at = :updated_at WHERE id = :id AND is_active = 1",
            named_params! {":id": id, ":updated_at": updated_at},
        )?;
        Ok(changed)
    }
}
