use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use tracing::debug;

use super::{parse_numeric_text, KpiCollector};
use crate::db::DbPool;
use crate::error::{AppError, AppResult, CollectorErrorCode};
use crate::models::data_source::{CollectorKind, DataSourceConfig, SqlQuerySource};
use crate::models::kpi::KpiRecord;

/// Runs a read-only query against the engine's own store and reads one scalar.
pub struct SqlQueryCollector {
    db: DbPool,
}

impl SqlQueryCollector {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KpiCollector for SqlQueryCollector {
    fn kind(&self) -> CollectorKind {
        CollectorKind::SqlQuery
    }

    async fn collect(
        &self,
        kpi: &KpiRecord,
        config: &DataSourceConfig,
    ) -> AppResult<Option<f64>> {
        let DataSourceConfig::SqlQuery(source) = config else {
            return Err(AppError::collector(
                CollectorKind::SqlQuery,
                CollectorErrorCode::InvalidPayload,
                format!("KPI {} 的数据源类型不是 sql_query", kpi.id),
            ));
        };

        let db = self.db.clone();
        let source = source.clone();
        let kpi_id = kpi.id.clone();

        let value = tokio::task::spawn_blocking(move || {
            let conn = db.get_connection()?;
            read_scalar(&conn, &source)
        })
        .await
        .map_err(|err| {
            AppError::collector(
                CollectorKind::SqlQuery,
                CollectorErrorCode::Unknown,
                format!("查询任务异常终止: {err}"),
            )
        })??;

        debug!(target: "app::collector", kpi_id = %kpi_id, value = ?value, "sql query collected");
        Ok(value)
    }
}

fn read_scalar(conn: &Connection, source: &SqlQuerySource) -> AppResult<Option<f64>> {
    let mut stmt = conn.prepare(source.statement()).map_err(|err| {
        AppError::collector(
            CollectorKind::SqlQuery,
            CollectorErrorCode::SourceUnavailable,
            format!("SQL 预编译失败: {err}"),
        )
    })?;

    if !stmt.readonly() {
        return Err(AppError::collector(
            CollectorKind::SqlQuery,
            CollectorErrorCode::InvalidPayload,
            "SQL 数据源必须是只读查询",
        ));
    }

    let column_index = match source.column.as_deref() {
        Some(name) => stmt.column_index(name.trim()).map_err(|_| {
            AppError::collector(
                CollectorKind::SqlQuery,
                CollectorErrorCode::InvalidPayload,
                format!("查询结果中不存在列: {name}"),
            )
        })?,
        None => 0,
    };

    if stmt.column_count() == 0 {
        return Err(AppError::collector(
            CollectorKind::SqlQuery,
            CollectorErrorCode::InvalidPayload,
            "查询没有返回任何列",
        ));
    }

    let mut rows = stmt.query([])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };

    let value = match row.get_ref(column_index)? {
        ValueRef::Null => None,
        ValueRef::Integer(value) => Some(value as f64),
        ValueRef::Real(value) => Some(value),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            parse_numeric_text(&text).map_err(|message| {
                AppError::collector(
                    CollectorKind::SqlQuery,
                    CollectorErrorCode::InvalidPayload,
                    message,
                )
            })?
        }
        ValueRef::Blob(_) => {
            return Err(AppError::collector(
                CollectorKind::SqlQuery,
                CollectorErrorCode::InvalidPayload,
                "查询结果是二进制数据，无法作为 KPI 数值",
            ))
        }
    };

    Ok(value)
}
