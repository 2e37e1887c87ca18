use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::strategy::BscDimension;

/// Qualitative band for a 0-100 health score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthLevel {
    Excellent,
    Good,
    Warning,
    Danger,
}

impl HealthLevel {
    /// Thresholds are checked highest first; out-of-range scores are classified as given.
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            HealthLevel::Excellent
        } else if score >= 70.0 {
            HealthLevel::Good
        } else if score >= 50.0 {
            HealthLevel::Warning
        } else {
            HealthLevel::Danger
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthLevel::Excellent => "EXCELLENT",
            HealthLevel::Good => "GOOD",
            HealthLevel::Warning => "WARNING",
            HealthLevel::Danger => "DANGER",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "EXCELLENT" => Ok(HealthLevel::Excellent),
            "GOOD" => Ok(HealthLevel::Good),
            "WARNING" => Ok(HealthLevel::Warning),
            "DANGER" => Ok(HealthLevel::Danger),
            _ => Err(format!("Invalid health level: {}", s)),
        }
    }
}

impl fmt::Display for HealthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "UP",
            Trend::Down => "DOWN",
            Trend::Stable => "STABLE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KpiHealth {
    pub kpi_id: String,
    pub completion_rate: Option<f64>,
    pub score: Option<i32>,
    pub level: Option<HealthLevel>,
}

impl KpiHealth {
    pub fn undefined(kpi_id: impl Into<String>) -> Self {
        Self {
            kpi_id: kpi_id.into(),
            completion_rate: None,
            score: None,
            level: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CsfHealth {
    pub csf_id: String,
    pub score: Option<i32>,
    pub level: Option<HealthLevel>,
    /// Unweighted mean of the completion rates that could be computed.
    pub kpi_completion_rate: Option<f64>,
    pub scored_kpis: usize,
}

impl CsfHealth {
    pub fn undefined(csf_id: impl Into<String>) -> Self {
        Self {
            csf_id: csf_id.into(),
            score: None,
            level: None,
            kpi_completion_rate: None,
            scored_kpis: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DimensionHealth {
    pub dimension: BscDimension,
    pub score: Option<i32>,
    pub level: Option<HealthLevel>,
    /// Raw sum of the active CSF weights in this dimension.
    pub csf_weight_sum: f64,
    pub scored_csfs: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DimensionContribution {
    #[serde(flatten)]
    pub health: DimensionHealth,
    /// Weight applied at strategy level; `None` when the dimension had no score.
    pub applied_weight: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StrategyHealth {
    pub strategy_id: String,
    pub score: Option<i32>,
    pub level: Option<HealthLevel>,
    pub dimensions: Vec<DimensionContribution>,
}
