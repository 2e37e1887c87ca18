use serde::{Deserialize, Serialize};

use crate::models::data_source::DataSourceConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KpiRecord {
    pub id: String,
    pub csf_id: String,
    pub name: String,
    pub unit: Option<String>,
    pub direction: KpiDirection,
    pub target_value: Option<f64>,
    pub current_value: Option<f64>,
    pub weight: Option<f64>,
    pub frequency: UpdateFrequency,
    pub is_active: bool,
    pub data_source: Option<DataSourceConfig>,
    pub last_collected_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Whether higher or lower values count as better.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KpiDirection {
    #[default]
    Up,
    Down,
}

impl KpiDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            KpiDirection::Up => "UP",
            KpiDirection::Down => "DOWN",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "UP" => Ok(KpiDirection::Up),
            "DOWN" => Ok(KpiDirection::Down),
            _ => Err(format!("Invalid KPI direction: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateFrequency {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

impl UpdateFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateFrequency::Daily => "DAILY",
            UpdateFrequency::Weekly => "WEEKLY",
            UpdateFrequency::Monthly => "MONTHLY",
            UpdateFrequency::Quarterly => "QUARTERLY",
            UpdateFrequency::Yearly => "YEARLY",
        }
    }

    /// Anything unrecognized falls back to yearly.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAILY" => UpdateFrequency::Daily,
            "WEEKLY" => UpdateFrequency::Weekly,
            "MONTHLY" => UpdateFrequency::Monthly,
            "QUARTERLY" => UpdateFrequency::Quarterly,
            _ => UpdateFrequency::Yearly,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KpiCreateInput {
    pub csf_id: String,
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub direction: KpiDirection,
    #[serde(default)]
    pub target_value: Option<f64>,
    #[serde(default)]
    pub current_value: Option<f64>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub frequency: UpdateFrequency,
    #[serde(default)]
    pub data_source: Option<DataSourceConfig>,
}
