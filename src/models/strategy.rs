use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StrategyRecord {
    pub id: String,
    pub name: String,
    pub year: i32,
    pub status: StrategyStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyStatus {
    Draft,
    Active,
    Archived,
}

impl StrategyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyStatus::Draft => "DRAFT",
            StrategyStatus::Active => "ACTIVE",
            StrategyStatus::Archived => "ARCHIVED",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "DRAFT" => Ok(StrategyStatus::Draft),
            "ACTIVE" => Ok(StrategyStatus::Active),
            "ARCHIVED" => Ok(StrategyStatus::Archived),
            _ => Err(format!("Invalid strategy status: {}", s)),
        }
    }
}

/// The four Balanced-Scorecard perspectives a CSF can belong to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BscDimension {
    Financial,
    Customer,
    Internal,
    Learning,
}

impl BscDimension {
    pub const ALL: [BscDimension; 4] = [
        BscDimension::Financial,
        BscDimension::Customer,
        BscDimension::Internal,
        BscDimension::Learning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BscDimension::Financial => "FINANCIAL",
            BscDimension::Customer => "CUSTOMER",
            BscDimension::Internal => "INTERNAL",
            BscDimension::Learning => "LEARNING",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "FINANCIAL" => Ok(BscDimension::Financial),
            "CUSTOMER" => Ok(BscDimension::Customer),
            "INTERNAL" => Ok(BscDimension::Internal),
            "LEARNING" => Ok(BscDimension::Learning),
            _ => Err(format!("Invalid BSC dimension: {}", s)),
        }
    }
}

impl fmt::Display for BscDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CsfRecord {
    pub id: String,
    pub strategy_id: String,
    pub name: String,
    pub dimension: BscDimension,
    /// Unset is stored as NULL and aggregates as if it were zero.
    pub weight: Option<f64>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StrategyCreateInput {
    pub name: String,
    pub year: i32,
    #[serde(default)]
    pub status: Option<StrategyStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CsfCreateInput {
    pub strategy_id: String,
    pub name: String,
    pub dimension: BscDimension,
    #[serde(default)]
    pub weight: Option<f64>,
}
