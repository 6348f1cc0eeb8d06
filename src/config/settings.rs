//! Application configuration loading from config.toml
//!
//! This module loads the ledger settings, the bootstrap admin ids and the catalog
//! seed from a TOML file. Every section is optional; missing sections fall back
//! to defaults.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Checkup reward used when `[ledger]` does not set one
pub const DEFAULT_CHECKUP_REWARD: i64 = 10;
/// History window used when `[ledger]` does not set one
pub const DEFAULT_HISTORY_WINDOW_DAYS: i64 = 30;
/// Longest history window `validate` accepts
pub const MAX_HISTORY_WINDOW_DAYS: i64 = 36_500;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Coin ledger settings
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Identity-provider ids that are bootstrapped as approved admins
    #[serde(default)]
    pub admins: Vec<String>,
    /// Products to seed into the catalog
    #[serde(default)]
    pub products: Vec<ProductConfig>,
}

/// `[ledger]` section
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct LedgerConfig {
    /// Coins credited to the salesperson for each completed checkup
    pub checkup_reward: i64,
    /// Length of the history view window in days
    pub history_window_days: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            checkup_reward: DEFAULT_CHECKUP_REWARD,
            history_window_days: DEFAULT_HISTORY_WINDOW_DAYS,
        }
    }
}

/// Configuration for a single catalog product
#[derive(Debug, Deserialize, Clone)]
pub struct ProductConfig {
    /// Name of the product
    pub name: String,
    /// Unit price
    pub price: f64,
    /// Serial number, used to detect products that are already seeded
    pub serial_number: String,
    /// Coins paid to the delivering salesperson
    #[serde(default)]
    pub coins_assigned: i64,
}

impl AppConfig {
    /// Checks values that TOML typing alone cannot enforce.
    ///
    /// # Errors
    /// Returns `Error::Config` if a ledger setting is not positive or the history
    /// window is longer than [`MAX_HISTORY_WINDOW_DAYS`].
    pub fn validate(&self) -> Result<()> {
        if self.ledger.checkup_reward <= 0 {
            return Err(Error::Config {
                message: format!(
                    "ledger.checkup_reward must be positive, got {}",
                    self.ledger.checkup_reward
                ),
            });
        }
        if !(1..=MAX_HISTORY_WINDOW_DAYS).contains(&self.ledger.history_window_days) {
            return Err(Error::Config {
                message: format!(
                    "ledger.history_window_days must be between 1 and {MAX_HISTORY_WINDOW_DAYS}, got {}",
                    self.ledger.history_window_days
                ),
            });
        }
        Ok(())
    }
}

/// Loads application configuration from a TOML file
///
/// # Arguments
/// * `path` - Path to the config.toml file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A ledger setting is not positive
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Loading configuration from {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {path_ref:?}: {e}"),
    })?;

    parse_config(&contents)
}

/// Parses and validates configuration from TOML text.
///
/// # Errors
/// Returns `Error::Config` on invalid TOML or invalid values.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads configuration from `CONFIG_PATH`, or `./config.toml` when unset.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn load_default_config() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_config(path)
}
