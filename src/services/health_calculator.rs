//! Pure scoring math shared by the live health engine and the snapshot recorder.

use crate::models::health::{HealthLevel, KpiHealth, Trend};
use crate::models::kpi::{KpiDirection, KpiRecord};

pub const COMPLETION_RATE_CAP: f64 = 150.0;
pub const DEFAULT_DIMENSION_WEIGHT: f64 = 25.0;

/// Direction-aware completion percentage, capped at 150.
///
/// `None` when the target is missing or zero; a missing current value is 0%.
pub fn completion_rate(
    current: Option<f64>,
    target: Option<f64>,
    direction: KpiDirection,
) -> Option<f64> {
    let target = match target {
        Some(target) if target != 0.0 => target,
        _ => return None,
    };
    let current = match current {
        Some(current) => current,
        None => return Some(0.0),
    };

    let rate = match direction {
        KpiDirection::Up => current / target * 100.0,
        KpiDirection::Down => {
            if current == 0.0 {
                // zero targets returned above
                200.0
            } else {
                target / current * 100.0
            }
        }
    };

    Some(rate.min(COMPLETION_RATE_CAP))
}

/// Maps a completion rate to a 0-100 integer score.
///
/// Both middle bands reduce to `floor(rate)`; they are kept as written so the
/// breakpoints stay visible.
pub fn score_from_rate(rate: f64) -> i32 {
    if rate >= 100.0 {
        100
    } else if rate >= 80.0 {
        (80.0 + (rate - 80.0)).floor() as i32
    } else if rate >= 60.0 {
        (60.0 + (rate - 60.0)).floor() as i32
    } else {
        rate.floor() as i32
    }
}

pub fn evaluate_kpi(kpi: &KpiRecord) -> KpiHealth {
    match completion_rate(kpi.current_value, kpi.target_value, kpi.direction) {
        Some(rate) => {
            let score = score_from_rate(rate);
            KpiHealth {
                kpi_id: kpi.id.clone(),
                completion_rate: Some(rate),
                score: Some(score),
                level: Some(HealthLevel::from_score(score as f64)),
            }
        }
        None => KpiHealth::undefined(kpi.id.clone()),
    }
}

/// Level stored on a snapshot: the rate is re-capped at 100 before classifying.
pub fn snapshot_health_level(completion_rate: Option<f64>) -> Option<HealthLevel> {
    completion_rate.map(|rate| HealthLevel::from_score(rate.min(100.0)))
}

/// Weighted mean over the items that produce a score.
///
/// Items whose `score_fn` yields `None` are skipped. `weight_fn` returns the
/// raw weight; zero or `None` falls back to `default_weight`. Returns `None`
/// when nothing scored or the weights cancel out to zero.
pub fn weighted_average<T, S, W>(
    items: &[T],
    score_fn: S,
    weight_fn: W,
    default_weight: f64,
) -> Option<f64>
where
    S: Fn(&T) -> Option<f64>,
    W: Fn(&T) -> Option<f64>,
{
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;

    for item in items {
        let Some(score) = score_fn(item) else {
            continue;
        };
        let weight = match weight_fn(item) {
            Some(weight) if weight != 0.0 => weight,
            _ => default_weight,
        };
        weighted_sum += score * weight;
        total_weight += weight;
    }

    if total_weight == 0.0 {
        None
    } else {
        Some(weighted_sum / total_weight)
    }
}

/// Rounds an aggregate to the integer score reported at CSF, dimension and strategy level.
pub fn round_score(value: f64) -> i32 {
    value.round() as i32
}

/// Movement between the newest value and the one before it.
pub fn infer_trend(newest: Option<f64>, previous: Option<f64>) -> Option<Trend> {
    let (newest, previous) = (newest?, previous?);
    if newest > previous {
        Some(Trend::Up)
    } else if newest < previous {
        Some(Trend::Down)
    } else {
        Some(Trend::Stable)
    }
}
