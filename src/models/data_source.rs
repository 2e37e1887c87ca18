//! Typed data-source configuration for automated KPI collection.
//!
//! Stored as JSON text in `kpis.data_source_config` and decoded only at the
//! repository boundary. Schema, tagged by `type`:
//!
//! ```json
//! {"type": "manual"}
//! {"type": "sql_query", "query": "SELECT SUM(amount) FROM orders", "column": null}
//! {"type": "http_json", "url": "https://erp/api/revenue", "value_pointer": "/data/total", "headers": {}}
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Closed set of registry keys for automated collectors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CollectorKind {
    SqlQuery,
    HttpJson,
}

impl CollectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectorKind::SqlQuery => "sql_query",
            CollectorKind::HttpJson => "http_json",
        }
    }
}

impl fmt::Display for CollectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataSourceConfig {
    Manual,
    SqlQuery(SqlQuerySource),
    HttpJson(HttpJsonSource),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SqlQuerySource {
    pub query: String,
    /// Column to read from the first row; the first column when unset.
    #[serde(default)]
    pub column: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpJsonSource {
    pub url: String,
    /// RFC 6901 pointer into the response body.
    pub value_pointer: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl DataSourceConfig {
    /// `None` for manual sources, which are never collected automatically.
    pub fn collector_kind(&self) -> Option<CollectorKind> {
        match self {
            DataSourceConfig::Manual => None,
            DataSourceConfig::SqlQuery(_) => Some(CollectorKind::SqlQuery),
            DataSourceConfig::HttpJson(_) => Some(CollectorKind::HttpJson),
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        match self {
            DataSourceConfig::Manual => Ok(()),
            DataSourceConfig::SqlQuery(source) => source.validate(),
            DataSourceConfig::HttpJson(source) => source.validate(),
        }
    }

    pub fn to_json(&self) -> AppResult<String> {
        serde_json::to_string(self).map_err(AppError::from)
    }

    pub fn from_json(raw: &str) -> AppResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }
}

impl SqlQuerySource {
    /// Statement with any trailing semicolon removed.
    pub fn statement(&self) -> &str {
        self.query.trim().trim_end_matches(';').trim_end()
    }

    fn validate(&self) -> AppResult<()> {
        let statement = self.statement();
        if statement.is_empty() {
            return Err(AppError::validation("SQL 数据源查询不能为空"));
        }
        let lowered = statement.to_ascii_lowercase();
        if !(lowered.starts_with("select") || lowered.starts_with("with")) {
            return Err(AppError::validation("SQL 数据源仅支持 SELECT 查询"));
        }
        if statement.contains(';') {
            return Err(AppError::validation("SQL 数据源不支持多条语句"));
        }
        if let Some(column) = &self.column {
            if column.trim().is_empty() {
                return Err(AppError::validation("SQL 数据源列名不能为空"));
            }
        }
        Ok(())
    }
}

impl HttpJsonSource {
    fn validate(&self) -> AppResult<()> {
        let url = self.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AppError::validation_with_details(
                "HTTP 数据源地址必须以 http:// 或 https:// 开头",
                serde_json::json!({ "url": self.url }),
            ));
        }
        if !self.value_pointer.starts_with('/') {
            return Err(AppError::validation_with_details(
                "取值路径必须是以 / 开头的 JSON Pointer",
                serde_json::json!({ "valuePointer": self.value_pointer }),
            ));
        }
        Ok(())
    }
}
