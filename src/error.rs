use std::fmt;

use rusqlite;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{error, warn};

use crate::models::data_source::CollectorKind;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorErrorCode {
    NotRegistered,
    Timeout,
    SourceUnavailable,
    InvalidPayload,
    Unknown,
}

impl CollectorErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            CollectorErrorCode::NotRegistered => "COLLECTOR_NOT_REGISTERED",
            CollectorErrorCode::Timeout => "COLLECTOR_TIMEOUT",
            CollectorErrorCode::SourceUnavailable => "SOURCE_UNAVAILABLE",
            CollectorErrorCode::InvalidPayload => "INVALID_PAYLOAD",
            CollectorErrorCode::Unknown => "UNKNOWN_COLLECTOR_ERROR",
        }
    }
}

impl fmt::Display for CollectorErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("数据库错误: {message}")]
    Database { message: String },

    #[error("记录未找到")]
    NotFound,

    #[error("记录冲突: {message}")]
    Conflict { message: String },

    #[error("验证失败: {message}")]
    Validation {
        message: String,
        details: Option<JsonValue>,
    },

    #[error("数据采集失败 [{kind}]: {message}")]
    Collector {
        kind: CollectorKind,
        code: CollectorErrorCode,
        message: String,
    },

    #[error("配置错误: {0}")]
    Config(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, "validation error");
        AppError::Validation {
            message,
            details: None,
        }
    }

    pub fn validation_with_details(message: impl Into<String>, details: JsonValue) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, details = %details, "validation error with details");
        AppError::Validation {
            message,
            details: Some(details),
        }
    }

    pub fn collector(
        kind: CollectorKind,
        code: CollectorErrorCode,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        warn!(target: "app::collector", kind = %kind, code = %code, %message, "collector error");
        AppError::Collector {
            kind,
            code,
            message,
        }
    }

    pub fn collector_code(&self) -> Option<CollectorErrorCode> {
        match self {
            AppError::Collector { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::conflict", %message, "conflict error");
        AppError::Conflict { message }
    }

    pub fn not_found() -> Self {
        warn!(target: "app::database", "resource not found");
        AppError::NotFound
    }

    pub fn database(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::database", %message, "database error");
        AppError::Database { message }
    }

    pub fn config(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::config", %message, "configuration error");
        AppError::Config(message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::other", %message, "other error");
        AppError::Other(message)
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        use rusqlite::Error::{QueryReturnedNoRows, SqliteFailure};
        use rusqlite::ErrorCode;

        match &error {
            QueryReturnedNoRows => AppError::not_found(),
            SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
                AppError::conflict("违反唯一性或约束限制")
            }
            _ => {
                error!(target: "app::database", error = ?error, "sqlite error");
                AppError::database(error.to_string())
            }
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::config(error.to_string())
    }
}
