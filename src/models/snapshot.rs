use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::health::HealthLevel;

/// Immutable history row written once per KPI value change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KpiSnapshotRecord {
    pub id: String,
    pub kpi_id: String,
    pub snapshot_date: String,
    pub period_key: String,
    pub value: Option<f64>,
    pub target_value: Option<f64>,
    pub completion_rate: Option<f64>,
    pub health_level: Option<HealthLevel>,
    pub source_type: SnapshotSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotSource {
    #[default]
    Manual,
    Automatic,
}

impl SnapshotSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotSource::Manual => "MANUAL",
            SnapshotSource::Automatic => "AUTOMATIC",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "MANUAL" => Ok(SnapshotSource::Manual),
            "AUTOMATIC" => Ok(SnapshotSource::Automatic),
            _ => Err(format!("Invalid snapshot source: {}", s)),
        }
    }
}

/// Caller-supplied context for a snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotContext {
    pub source_type: SnapshotSource,
    pub recorded_by: Option<String>,
    pub remark: Option<String>,
    /// Defaults to now.
    pub recorded_at: Option<DateTime<Utc>>,
}

impl SnapshotContext {
    pub fn manual(recorded_by: Option<String>, remark: Option<String>) -> Self {
        Self {
            source_type: SnapshotSource::Manual,
            recorded_by,
            remark,
            recorded_at: None,
        }
    }

    pub fn automatic() -> Self {
        Self {
            source_type: SnapshotSource::Automatic,
            ..Self::default()
        }
    }

    pub fn at(mut self, recorded_at: DateTime<Utc>) -> Self {
        self.recorded_at = Some(recorded_at);
        self
    }
}
