pub mod csf_repository;
pub mod kpi_repository;
pub mod snapshot_repository;
pub mod strategy_repository;
