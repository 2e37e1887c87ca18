pub mod collector_registry;
pub mod data_collection_service;
pub mod health_calculator;
pub mod health_service;
pub mod kpi_service;
pub mod period_utils;
pub mod snapshot_service;
pub mod strategy_service;
