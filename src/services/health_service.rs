use rusqlite::Connection;
use tracing::debug;

use crate::db::repositories::csf_repository::CsfRepository;
use crate::db::repositories::kpi_repository::KpiRepository;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::health::{
    CsfHealth, DimensionContribution, DimensionHealth, HealthLevel, KpiHealth, StrategyHealth,
};
use crate::models::kpi::KpiRecord;
use crate::models::strategy::{BscDimension, CsfRecord};
use crate::services::health_calculator::{
    evaluate_kpi, round_score, weighted_average, DEFAULT_DIMENSION_WEIGHT,
};

/// Read-only health rollups. Every call recomputes from the current rows.
pub struct HealthService {
    db: DbPool,
}

impl HealthService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Missing or inactive KPIs evaluate as undefined.
    pub fn kpi_health(&self, kpi_id: &str) -> AppResult<KpiHealth> {
        self.db.with_connection(|conn| {
            Ok(match KpiRepository::find_active_by_id(conn, kpi_id)? {
                Some(kpi) => evaluate_kpi(&kpi),
                None => KpiHealth::undefined(kpi_id),
            })
        })
    }

    pub fn csf_health(&self, csf_id: &str) -> AppResult<CsfHealth> {
        self.db.with_connection(|conn| {
            match CsfRepository::find_by_id(conn, csf_id)? {
                Some(csf) if csf.is_active => csf_health_with(conn, &csf.id),
                _ => Ok(CsfHealth::undefined(csf_id)),
            }
        })
    }

    pub fn dimension_health(
        &self,
        strategy_id: &str,
        dimension: BscDimension,
    ) -> AppResult<DimensionHealth> {
        self.db
            .with_connection(|conn| dimension_health_with(conn, strategy_id, dimension))
    }

    pub fn strategy_health(&self, strategy_id: &str) -> AppResult<StrategyHealth> {
        self.db.with_connection(|conn| {
            let dimensions = BscDimension::ALL
                .iter()
                .map(|dimension| dimension_health_with(conn, strategy_id, *dimension))
                .collect::<AppResult<Vec<_>>>()?;

            let health = aggregate_strategy(strategy_id, dimensions);
            debug!(
                target: "app::health",
                strategy_id,
                score = ?health.score,
                level = ?health.level,
                "strategy health computed"
            );
            Ok(health)
        })
    }
}

fn csf_health_with(conn: &Connection, csf_id: &str) -> AppResult<CsfHealth> {
    let kpis = KpiRepository::list_active_by_csf(conn, csf_id)?;
    let health = aggregate_csf(csf_id, &kpis);
    debug!(
        target: "app::health",
        csf_id,
        kpis = kpis.len(),
        scored = health.scored_kpis,
        score = ?health.score,
        "csf health computed"
    );
    Ok(health)
}

fn dimension_health_with(
    conn: &Connection,
    strategy_id: &str,
    dimension: BscDimension,
) -> AppResult<DimensionHealth> {
    let csfs = CsfRepository::list_active_by_dimension(conn, strategy_id, dimension)?;
    let scored = csfs
        .into_iter()
        .map(|csf| {
            let health = csf_health_with(conn, &csf.id)?;
            Ok((csf, health))
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(aggregate_dimension(dimension, &scored))
}

/// Weighted rollup of a CSF's active KPIs; zero or unset KPI weights count as 1.
pub fn aggregate_csf(csf_id: &str, kpis: &[KpiRecord]) -> CsfHealth {
    let evaluated: Vec<(KpiHealth, Option<f64>)> = kpis
        .iter()
        .filter(|kpi| kpi.is_active)
        .map(|kpi| (evaluate_kpi(kpi), kpi.weight))
        .collect();

    let scored_kpis = evaluated
        .iter()
        .filter(|(health, _)| health.score.is_some())
        .count();

    let average = weighted_average(
        &evaluated,
        |(health, _)| health.score.map(f64::from),
        |(_, weight)| *weight,
        1.0,
    );

    let Some(average) = average else {
        return CsfHealth::undefined(csf_id);
    };

    let rates: Vec<f64> = evaluated
        .iter()
        .filter_map(|(health, _)| health.completion_rate)
        .collect();
    let kpi_completion_rate = if rates.is_empty() {
        None
    } else {
        Some(rates.iter().sum::<f64>() / rates.len() as f64)
    };

    let score = round_score(average);
    CsfHealth {
        csf_id: csf_id.to_string(),
        score: Some(score),
        level: Some(HealthLevel::from_score(score as f64)),
        kpi_completion_rate,
        scored_kpis,
    }
}

/// Weighted rollup of the CSFs in one dimension, keyed on each CSF's own weight.
pub fn aggregate_dimension(
    dimension: BscDimension,
    csfs: &[(CsfRecord, CsfHealth)],
) -> DimensionHealth {
    let active: Vec<&(CsfRecord, CsfHealth)> =
        csfs.iter().filter(|(csf, _)| csf.is_active).collect();

    let csf_weight_sum = active
        .iter()
        .map(|(csf, _)| csf.weight.unwrap_or(0.0))
        .sum::<f64>();
    let scored_csfs = active
        .iter()
        .filter(|(_, health)| health.score.is_some())
        .count();

    let score = weighted_average(
        &active,
        |(_, health)| health.score.map(f64::from),
        |(csf, _)| csf.weight,
        1.0,
    )
    .map(round_score);

    DimensionHealth {
        dimension,
        score,
        level: score.map(|score| HealthLevel::from_score(score as f64)),
        csf_weight_sum,
        scored_csfs,
    }
}

/// Rollup of the four dimensions.
///
/// A scored dimension weighs the sum of its CSF weights when that sum is
/// positive, otherwise the default of 25.
pub fn aggregate_strategy(strategy_id: &str, dimensions: Vec<DimensionHealth>) -> StrategyHealth {
    let contributions: Vec<DimensionContribution> = dimensions
        .into_iter()
        .map(|health| {
            let applied_weight = health.score.map(|_| {
                if health.csf_weight_sum > 0.0 {
                    health.csf_weight_sum
                } else {
                    DEFAULT_DIMENSION_WEIGHT
                }
            });
            DimensionContribution {
                health,
                applied_weight,
            }
        })
        .collect();

    let score = weighted_average(
        &contributions,
        |contribution| contribution.health.score.map(f64::from),
        |contribution| contribution.applied_weight,
        DEFAULT_DIMENSION_WEIGHT,
    )
    .map(round_score);

    StrategyHealth {
        strategy_id: strategy_id.to_string(),
        score,
        level: score.map(|score| HealthLevel::from_score(score as f64)),
        dimensions: contributions,
    }
}
