mod config;
pub mod database;
pub mod ledger;
pub mod migrations;
pub mod tasks;

pub use config::{Config, TickConfig, TimerConfig, CONFIG_FILE};
pub use database::{Database, DB_FILE};
pub use ledger::SqliteLedger;
pub use tasks::SqliteTaskStore;

use std::path::PathBuf;

use crate::error::CoreError;

/// Returns `~/.config/flowtimer[-dev]/` based on FLOWTIMER_ENV.
///
/// Set FLOWTIMER_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, CoreError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("FLOWTIMER_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("flowtimer-dev")
    } else {
        base_dir.join("flowtimer")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
