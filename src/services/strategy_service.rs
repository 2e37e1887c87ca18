use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::db::repositories::csf_repository::{CsfRepository, CsfRow};
use crate::db::repositories::strategy_repository::{StrategyRepository, StrategyRow};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::strategy::{
    CsfCreateInput, CsfRecord, StrategyCreateInput, StrategyRecord, StrategyStatus,
};

pub struct StrategyService {
    db: DbPool,
}

impl StrategyService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn create_strategy(&self, input: StrategyCreateInput) -> AppResult<StrategyRecord> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::validation("战略名称不能为空"));
        }
        if !(1900..=9999).contains(&input.year) {
            return Err(AppError::validation(format!("无效的战略年度: {}", input.year)));
        }

        let now = Utc::now().to_rfc3339();
        let record = StrategyRecord {
            id: Uuid::new_v4().to_string(),
            name,
            year: input.year,
            status: input.status.unwrap_or(StrategyStatus::Draft),
            created_at: now.clone(),
            updated_at: now,
        };

        self.db.with_connection(|conn| {
            StrategyRepository::insert(conn, &StrategyRow::from_record(&record))
        })?;

        info!(target: "app::strategy", strategy_id = %record.id, year = record.year, "strategy created");
        Ok(record)
    }

    pub fn get_strategy(&self, id: &str) -> AppResult<StrategyRecord> {
        self.db
            .with_connection(|conn| StrategyRepository::find_by_id(conn, id))?
            .ok_or_else(AppError::not_found)
    }

    pub fn list_strategies(&self) -> AppResult<Vec<StrategyRecord>> {
        self.db.with_connection(StrategyRepository::list_all)
    }

    pub fn create_csf(&self, input: CsfCreateInput) -> AppResult<CsfRecord> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::validation("关键成功因素名称不能为空"));
        }
        ensure_valid_weight(input.weight)?;

        let now = Utc::now().to_rfc3339();
        let record = CsfRecord {
            id: Uuid::new_v4().to_string(),
            strategy_id: input.strategy_id,
            name,
            dimension: input.dimension,
            weight: input.weight,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        };

        self.db.with_connection(|conn| {
            if !StrategyRepository::exists(conn, &record.strategy_id)? {
                return Err(AppError::validation(format!(
                    "Strategy not found: {}",
                    record.strategy_id
                )));
            }
            CsfRepository::insert(conn, &CsfRow::from_record(&record))
        })?;

        info!(
            target: "app::strategy",
            csf_id = %record.id,
            strategy_id = %record.strategy_id,
            dimension = %record.dimension,
            "csf created"
        );
        Ok(record)
    }

    pub fn get_csf(&self, id: &str) -> AppResult<CsfRecord> {
        self.db
            .with_connection(|conn| CsfRepository::find_by_id(conn, id))?
            .ok_or_else(AppError::not_found)
    }

    pub fn list_active_csfs(&self, strategy_id: &str) -> AppResult<Vec<CsfRecord>> {
        self.db
            .with_connection(|conn| CsfRepository::list_active_by_strategy(conn, strategy_id))
    }

    /// Soft delete. KPI rows and their history are left untouched.
    pub fn deactivate_csf(&self, id: &str) -> AppResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self
            .db
            .with_connection(|conn| CsfRepository::deactivate(conn, id, &now))?;
        if changed == 0 {
            return Err(AppError::not_found());
        }
        info!(target: "app::strategy", csf_id = id, "csf deactivated");
        Ok(())
    }
}

pub(crate) fn ensure_valid_weight(weight: Option<f64>) -> AppResult<()> {
    match weight {
        Some(weight) if !weight.is_finite() => Err(AppError::validation("权重必须是有限数字")),
        _ => Ok(()),
    }
}
