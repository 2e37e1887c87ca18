use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value as JsonValue;
use tracing::debug;

use super::{numeric_from_json, KpiCollector};
use crate::error::{AppError, AppResult, CollectorErrorCode};
use crate::models::data_source::{CollectorKind, DataSourceConfig};
use crate::models::kpi::KpiRecord;

/// Fetches a JSON document over HTTP and reads the value at a JSON pointer.
pub struct HttpJsonCollector {
    client: reqwest::Client,
}

impl HttpJsonCollector {
    pub fn try_new(timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(|err| AppError::other(format!("初始化 HTTP 采集客户端失败: {err}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl KpiCollector for HttpJsonCollector {
    fn kind(&self) -> CollectorKind {
        CollectorKind::HttpJson
    }

    async fn collect(
        &self,
        kpi: &KpiRecord,
        config: &DataSourceConfig,
    ) -> AppResult<Option<f64>> {
        let DataSourceConfig::HttpJson(source) = config else {
            return Err(invalid_payload(format!(
                "KPI {} 的数据源类型不是 http_json",
                kpi.id
            )));
        };

        let mut request = self.client.get(source.url.trim());
        for (name, value) in &source.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(error_from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            return Err(error_from_status(status));
        }

        let body: JsonValue = response
            .json()
            .await
            .map_err(|err| invalid_payload(format!("响应不是有效的 JSON: {err}")))?;

        let value = extract_value(&body, &source.value_pointer)?;
        debug!(
            target: "app::collector",
            kpi_id = %kpi.id,
            url = %source.url,
            value = ?value,
            "http json collected"
        );
        Ok(value)
    }
}

fn extract_value(body: &JsonValue, pointer: &str) -> AppResult<Option<f64>> {
    let node = body
        .pointer(pointer)
        .ok_or_else(|| invalid_payload(format!("响应中不存在路径: {pointer}")))?;
    numeric_from_json(node).map_err(invalid_payload)
}

fn invalid_payload(message: impl Into<String>) -> AppError {
    AppError::collector(
        CollectorKind::HttpJson,
        CollectorErrorCode::InvalidPayload,
        message,
    )
}

fn error_from_status(status: StatusCode) -> AppError {
    AppError::collector(
        CollectorKind::HttpJson,
        CollectorErrorCode::SourceUnavailable,
        format!("数据源返回状态码 {}", status.as_u16()),
    )
}

fn error_from_reqwest(err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::collector(
            CollectorKind::HttpJson,
            CollectorErrorCode::Timeout,
            "数据源请求超时",
        )
    } else if err.is_connect() {
        AppError::collector(
            CollectorKind::HttpJson,
            CollectorErrorCode::SourceUnavailable,
            "数据源网络连接失败",
        )
    } else if let Some(status) = err.status() {
        error_from_status(status)
    } else {
        AppError::collector(
            CollectorKind::HttpJson,
            CollectorErrorCode::Unknown,
            format!("数据源请求失败: {err}"),
        )
    }
}
