pub mod collectors;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

pub use crate::config::AppConfig;
pub use crate::error::{AppError, AppResult};
pub use crate::state::AppState;

/// Loads configuration from the environment, starts logging and wires the services.
pub fn bootstrap() -> AppResult<AppState> {
    let config = AppConfig::load()?;
    config.validate()?;
    utils::logger::init_logging(&config.logging)?;
    AppState::from_config(&config)
}
