use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::strategy::{StrategyRecord, StrategyStatus};

#[derive(Debug, Clone)]
pub struct StrategyRow {
    pub id: String,
    pub name: String,
    pub year: i32,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl StrategyRow {
    pub fn from_record(record: &StrategyRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            year: record.year,
            status: record.status.as_str().to_string(),
            created_at: record.created_at.clone(),
            updated_at: record.updated_at.clone(),
        }
    }

    pub fn into_record(self) -> AppResult<StrategyRecord> {
        let status = StrategyStatus::from_str(&self.status).map_err(AppError::database)?;
        Ok(StrategyRecord {
            id: self.id,
            name: self.name,
            year: self.year,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl TryFrom<&Row<'_>> for StrategyRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            year: row.get("year")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct StrategyRepository;

impl StrategyRepository {
    pub fn insert(conn: &Connection, row: &StrategyRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO strategies (id, name, year, status, created_at, updated_at)
                VALUES (:id, :name, :year, :status, :created_at, :updated_at)
            "#,
            named_params! {
                ":id": &row.id,
                ":name": &row.name,
                ":year": &row.year,
                ":status": &row.status,
                ":created_at": &row.created_at,
                ":updated_at": &row.updated_at,
            },
        )?;

        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<StrategyRecord>> {
        let row = conn
            .query_row(
                r#"
                    SELECT id, name, year, status, created_at, updated_at
                    FROM strategies
                    WHERE id = :id
                "#,
                named_params! {":id": id},
                |row| StrategyRow::try_from(row),
            )
            .optional()?;

        row.map(|row| row.into_record()).transpose()
    }

    /// Newest year first.
    pub fn list_all(conn: &Connection) -> AppResult<Vec<StrategyRecord>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT id, name, year, status, created_at, updated_at
                FROM strategies
                ORDER BY year DESC, created_at, rowid
            "#,
        )?;
        let rows = stmt
            .query_map([], |row| StrategyRow::try_from(row))?
            .map(|row| row.map_err(AppError::from).and_then(|row| row.into_record()))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(rows)
    }

    pub fn exists(conn: &Connection, id: &str) -> AppResult<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM strategies WHERE id = :id)",
            named_params! {":id": id},
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}
