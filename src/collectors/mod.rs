//! Automated KPI value collectors.
//!
//! Each collector handles one [`CollectorKind`] and turns a KPI's
//! [`DataSourceConfig`] into a single numeric reading. Collectors never write;
//! persisting the reading is the snapshot recorder's job.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::AppResult;
use crate::models::data_source::{CollectorKind, DataSourceConfig};
use crate::models::kpi::KpiRecord;

pub mod http_json_collector;
pub mod sql_query_collector;

pub use http_json_collector::HttpJsonCollector;
pub use sql_query_collector::SqlQueryCollector;

#[async_trait]
pub trait KpiCollector: Send + Sync {
    fn kind(&self) -> CollectorKind;

    /// `Ok(None)` means the source answered but had no value.
    async fn collect(&self, kpi: &KpiRecord, config: &DataSourceConfig)
        -> AppResult<Option<f64>>;
}

/// Reads a JSON scalar as a KPI value: numbers and numeric strings, `null` as no value.
pub(crate) fn numeric_from_json(value: &JsonValue) -> Result<Option<f64>, String> {
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::Number(number) => number
            .as_f64()
            .map(Some)
            .ok_or_else(|| format!("数值超出范围: {number}")),
        JsonValue::String(text) => parse_numeric_text(text),
        other => Err(format!("期望数字，实际为: {other}")),
    }
}

pub(crate) fn parse_numeric_text(text: &str) -> Result<Option<f64>, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(format!("无法解析为数字: {trimmed}")),
    }
}
