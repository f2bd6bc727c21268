mod config;
pub mod database;

pub use config::Config;
pub use database::{Database, ResultRecord};

use std::path::PathBuf;

use crate::error::StorageError;

/// Returns `~/.config/quizgate[-dev]/` based on QUIZGATE_ENV.
///
/// Set QUIZGATE_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, StorageError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("QUIZGATE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("quizgate-dev")
    } else {
        base_dir.join("quizgate")
    };

    std::fs::create_dir_all(&dir).map_err(|e| StorageError::DataDir(e.to_string()))?;
    Ok(dir)
}
