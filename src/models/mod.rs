pub mod data_source;
pub mod health;
pub mod kpi;
pub mod snapshot;
pub mod strategy;
