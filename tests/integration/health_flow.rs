use chrono_tz::Tz;
use strategy_health::db::DbPool;
use strategy_health::error::AppError;
use strategy_health::models::health::HealthLevel;
use strategy_health::models::kpi::{KpiCreateInput, KpiDirection};
use strategy_health::models::strategy::{BscDimension, CsfCreateInput, StrategyCreateInput};
use strategy_health::services::health_service::HealthService;
use strategy_health::services::kpi_service::KpiService;
use strategy_health::services::snapshot_service::{SnapshotService, DEFAULT_HISTORY_LIMIT};
use strategy_health::services::strategy_service::StrategyService;
use tempfile::{tempdir, TempDir};

struct Fixture {
    _dir: TempDir,
    pool: DbPool,
    strategies: StrategyService,
    kpis: KpiService,
    health: HealthService,
    snapshots: SnapshotService,
}

fn setup() -> Fixture {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("health.sqlite")).expect("db pool");
    Fixture {
        strategies: StrategyService::new(pool.clone()),
        kpis: KpiService::new(pool.clone(), Tz::UTC),
        health: HealthService::new(pool.clone()),
        snapshots: SnapshotService::new(pool.clone(), Tz::UTC),
        pool,
        _dir: dir,
    }
}

fn kpi_input(
    csf_id: &str,
    name: &str,
    direction: KpiDirection,
    target: Option<f64>,
    current: Option<f64>,
    weight: Option<f64>,
) -> KpiCreateInput {
    KpiCreateInput {
        csf_id: csf_id.to_string(),
        name: name.to_string(),
        direction,
        target_value: target,
        current_value: current,
        weight,
        ..KpiCreateInput::default()
    }
}

fn csf_input(strategy_id: &str, name: &str, dimension: BscDimension, weight: Option<f64>) -> CsfCreateInput {
    CsfCreateInput {
        strategy_id: strategy_id.to_string(),
        name: name.to_string(),
        dimension,
        weight,
    }
}

#[test]
fn strategy_rolls_up_through_csfs_and_dimensions() {
    let fx = setup();
    let strategy = fx
        .strategies
        .create_strategy(StrategyCreateInput {
            name: "2025 growth plan".into(),
            year: 2025,
            status: None,
        })
        .expect("strategy");

    let financial = fx
        .strategies
        .create_csf(csf_input(&strategy.id, "Profitable growth", BscDimension::Financial, Some(60.0)))
        .expect("financial csf");
    let customer = fx
        .strategies
        .create_csf(csf_input(&strategy.id, "Loyal customers", BscDimension::Customer, None))
        .expect("customer csf");
    let internal = fx
        .strategies
        .create_csf(csf_input(&strategy.id, "Lean operations", BscDimension::Internal, Some(10.0)))
        .expect("internal csf");

    fx.kpis
        .create_kpi(kpi_input(&financial.id, "Revenue", KpiDirection::Up, Some(100.0), Some(100.0), Some(2.0)))
        .expect("revenue kpi");
    let cost = fx
        .kpis
        .create_kpi(kpi_input(&financial.id, "Unit cost", KpiDirection::Down, Some(50.0), Some(100.0), None))
        .expect("cost kpi");
    fx.kpis
        .create_kpi(kpi_input(&customer.id, "NPS", KpiDirection::Up, Some(100.0), Some(75.0), None))
        .expect("nps kpi");
    fx.kpis
        .create_kpi(kpi_input(&internal.id, "Defects", KpiDirection::Up, Some(0.0), Some(3.0), None))
        .expect("defect kpi");

    let cost_health = fx.health.kpi_health(&cost.id).expect("kpi health");
    assert_eq!(cost_health.completion_rate, Some(50.0));
    assert_eq!(cost_health.score, Some(50));
    assert_eq!(cost_health.level, Some(HealthLevel::Warning));

    // (100 * 2 + 50 * 1) / 3
    let financial_health = fx.health.csf_health(&financial.id).expect("csf health");
    assert_eq!(financial_health.score, Some(83));
    assert_eq!(financial_health.level, Some(HealthLevel::Good));
    assert_eq!(financial_health.scored_kpis, 2);
    assert_eq!(financial_health.kpi_completion_rate, Some(75.0));

    let internal_health = fx.health.csf_health(&internal.id).expect("csf health");
    assert_eq!(internal_health.score, None);
    assert_eq!(internal_health.level, None);

    let strategy_health = fx.health.strategy_health(&strategy.id).expect("strategy health");
    let dims = &strategy_health.dimensions;
    assert_eq!(dims.len(), 4);

    let financial_dim = dims
        .iter()
        .find(|d| d.health.dimension == BscDimension::Financial)
        .expect("financial dimension");
    assert_eq!(financial_dim.health.score, Some(83));
    assert_eq!(financial_dim.applied_weight, Some(60.0));

    let customer_dim = dims
        .iter()
        .find(|d| d.health.dimension == BscDimension::Customer)
        .expect("customer dimension");
    assert_eq!(customer_dim.health.score, Some(75));
    assert_eq!(customer_dim.applied_weight, Some(25.0));

    let internal_dim = dims
        .iter()
        .find(|d| d.health.dimension == BscDimension::Internal)
        .expect("internal dimension");
    assert_eq!(internal_dim.health.score, None);
    assert_eq!(internal_dim.applied_weight, None);

    // (83 * 60 + 75 * 25) / 85 = 80.65
    assert_eq!(strategy_health.score, Some(81));
    assert_eq!(strategy_health.level, Some(HealthLevel::Good));

    fx.kpis.deactivate_kpi(&cost.id).expect("deactivate");
    let after = fx.health.strategy_health(&strategy.id).expect("strategy health");
    // (100 * 60 + 75 * 25) / 85 = 92.65
    assert_eq!(after.score, Some(93));
    assert_eq!(after.level, Some(HealthLevel::Excellent));
}

#[test]
fn deactivated_csf_drops_out_of_its_dimension() {
    let fx = setup();
    let strategy = fx
        .strategies
        .create_strategy(StrategyCreateInput {
            name: "Talent".into(),
            year: 2026,
            status: None,
        })
        .expect("strategy");
    let strong = fx
        .strategies
        .create_csf(csf_input(&strategy.id, "Skills", BscDimension::Learning, Some(1.0)))
        .expect("csf");
    let weak = fx
        .strategies
        .create_csf(csf_input(&strategy.id, "Retention", BscDimension::Learning, Some(1.0)))
        .expect("csf");
    fx.kpis
        .create_kpi(kpi_input(&strong.id, "Training hours", KpiDirection::Up, Some(40.0), Some(40.0), None))
        .expect("kpi");
    fx.kpis
        .create_kpi(kpi_input(&weak.id, "Attrition", KpiDirection::Down, Some(5.0), Some(20.0), None))
        .expect("kpi");

    let dimension = fx
        .health
        .dimension_health(&strategy.id, BscDimension::Learning)
        .expect("dimension");
    // (100 + 25) / 2
    assert_eq!(dimension.score, Some(63));
    assert_eq!(dimension.level, Some(HealthLevel::Warning));
    assert_eq!(dimension.csf_weight_sum, 2.0);

    fx.strategies.deactivate_csf(&weak.id).expect("deactivate csf");
    let dimension = fx
        .health
        .dimension_health(&strategy.id, BscDimension::Learning)
        .expect("dimension");
    assert_eq!(dimension.score, Some(100));
    assert_eq!(dimension.csf_weight_sum, 1.0);
    assert_eq!(dimension.scored_csfs, 1);

    let csf_health = fx.health.csf_health(&weak.id).expect("csf health");
    assert_eq!(csf_health.score, None);
}

#[test]
fn strategy_without_scored_kpis_is_undefined() {
    let fx = setup();
    let strategy = fx
        .strategies
        .create_strategy(StrategyCreateInput {
            name: "Empty".into(),
            year: 2025,
            status: None,
        })
        .expect("strategy");

    let listed = fx.strategies.list_strategies().expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, strategy.id);

    let health = fx.health.strategy_health(&strategy.id).expect("strategy health");
    assert_eq!(health.score, None);
    assert_eq!(health.level, None);
    assert!(health.dimensions.iter().all(|d| d.health.score.is_none()));

    let unknown = fx.health.strategy_health("no-such-strategy").expect("strategy health");
    assert_eq!(unknown.score, None);
    assert_eq!(fx.health.kpi_health("no-such-kpi").expect("kpi").score, None);
}

#[test]
fn entity_validation_rejects_bad_input() {
    let fx = setup();

    let err = fx
        .strategies
        .create_strategy(StrategyCreateInput {
            name: "   ".into(),
            year: 2025,
            status: None,
        })
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let err = fx
        .strategies
        .create_strategy(StrategyCreateInput {
            name: "Old".into(),
            year: 1800,
            status: None,
        })
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let err = fx
        .strategies
        .create_csf(csf_input("missing", "Orphan", BscDimension::Customer, None))
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let strategy = fx
        .strategies
        .create_strategy(StrategyCreateInput {
            name: "Ops".into(),
            year: 2025,
            status: None,
        })
        .expect("strategy");
    let csf = fx
        .strategies
        .create_csf(csf_input(&strategy.id, "Throughput", BscDimension::Internal, None))
        .expect("csf");
    fx.strategies.deactivate_csf(&csf.id).expect("deactivate");

    let err = fx
        .kpis
        .create_kpi(kpi_input(&csf.id, "Cycle time", KpiDirection::Down, Some(3.0), None, None))
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let err = fx
        .kpis
        .create_kpi(kpi_input(&csf.id, "Cycle time", KpiDirection::Down, Some(f64::NAN), None, None))
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    assert!(matches!(fx.strategies.get_csf("missing"), Err(AppError::NotFound)));
}

#[test]
fn updating_target_changes_live_score() {
    let fx = setup();
    let strategy = fx
        .strategies
        .create_strategy(StrategyCreateInput {
            name: "Sales".into(),
            year: 2025,
            status: None,
        })
        .expect("strategy");
    let csf = fx
        .strategies
        .create_csf(csf_input(&strategy.id, "Pipeline", BscDimension::Customer, None))
        .expect("csf");
    let kpi = fx
        .kpis
        .create_kpi(kpi_input(&csf.id, "Deals", KpiDirection::Up, None, Some(45.0), None))
        .expect("kpi");

    assert_eq!(fx.health.kpi_health(&kpi.id).expect("kpi").score, None);

    let updated = fx.kpis.update_target(&kpi.id, Some(50.0)).expect("target");
    assert_eq!(updated.target_value, Some(50.0));

    let health = fx.health.kpi_health(&kpi.id).expect("kpi");
    assert_eq!(health.completion_rate, Some(90.0));
    assert_eq!(health.score, Some(90));
    assert_eq!(health.level, Some(HealthLevel::Excellent));
}

#[test]
fn unreadable_data_source_does_not_break_rollups() {
    let fx = setup();
    let strategy = fx
        .strategies
        .create_strategy(StrategyCreateInput {
            name: "Service quality".into(),
            year: 2025,
            status: None,
        })
        .expect("strategy");
    let csf = fx
        .strategies
        .create_csf(csf_input(&strategy.id, "Fast support", BscDimension::Customer, None))
        .expect("csf");
    let healthy = fx
        .kpis
        .create_kpi(kpi_input(&csf.id, "First response", KpiDirection::Up, Some(100.0), Some(90.0), None))
        .expect("kpi");
    let broken = fx
        .kpis
        .create_kpi(kpi_input(&csf.id, "Resolution", KpiDirection::Up, Some(100.0), Some(70.0), None))
        .expect("kpi");

    fx.pool
        .with_connection(|conn| {
            conn.execute(
                "UPDATE kpis SET data_source_config = '{\"type\":\"ftp\"}' WHERE id = ?1",
                [&broken.id],
            )?;
            Ok(())
        })
        .expect("corrupt config");

    let stored = fx.kpis.get_kpi(&broken.id).expect("kpi still readable");
    assert_eq!(stored.data_source, None);
    assert_eq!(stored.current_value, Some(70.0));
    assert_eq!(fx.kpis.list_active_kpis(&csf.id).expect("list").len(), 2);

    assert_eq!(fx.health.kpi_health(&healthy.id).expect("kpi").score, Some(90));

    let csf_health = fx.health.csf_health(&csf.id).expect("csf health");
    assert_eq!(csf_health.score, Some(80));
    assert_eq!(csf_health.scored_kpis, 2);

    let strategy_health = fx.health.strategy_health(&strategy.id).expect("strategy health");
    assert_eq!(strategy_health.score, Some(80));
}

#[test]
fn repeated_scoring_is_stable_across_reads() {
    let fx = setup();
    let strategy = fx
        .strategies
        .create_strategy(StrategyCreateInput {
            name: "Balanced plan".into(),
            year: 2025,
            status: None,
        })
        .expect("strategy");
    let finance = fx
        .strategies
        .create_csf(csf_input(&strategy.id, "Margin", BscDimension::Financial, Some(3.0)))
        .expect("csf");
    let learning = fx
        .strategies
        .create_csf(csf_input(&strategy.id, "Skills", BscDimension::Learning, None))
        .expect("csf");
    let margin = fx
        .kpis
        .create_kpi(kpi_input(&finance.id, "Gross margin", KpiDirection::Up, Some(40.0), Some(31.0), Some(2.0)))
        .expect("kpi");
    fx.kpis
        .create_kpi(kpi_input(&finance.id, "Overhead", KpiDirection::Down, Some(10.0), Some(12.5), None))
        .expect("kpi");
    fx.kpis
        .create_kpi(kpi_input(&learning.id, "Certifications", KpiDirection::Up, Some(20.0), Some(11.0), None))
        .expect("kpi");

    let first_strategy = fx.health.strategy_health(&strategy.id).expect("strategy health");
    let first_csf = fx.health.csf_health(&finance.id).expect("csf health");

    fx.snapshots.kpi_trend(&margin.id).expect("trend");
    fx.snapshots
        .list_history(&margin.id, DEFAULT_HISTORY_LIMIT)
        .expect("history");

    let second_strategy = fx.health.strategy_health(&strategy.id).expect("strategy health");
    let second_csf = fx.health.csf_health(&finance.id).expect("csf health");

    assert_eq!(first_strategy, second_strategy);
    assert_eq!(first_strategy.dimensions, second_strategy.dimensions);
    assert_eq!(first_csf, second_csf);
    assert!(first_strategy.score.is_some());
}
