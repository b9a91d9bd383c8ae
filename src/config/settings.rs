//! User settings for Tally
//!
//! Manages backup retention, lock waits and display preferences.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::paths::TallyPaths;
use crate::error::{PersistenceError, PersistenceResult};
use crate::storage::file_io::write_json_atomic;

/// User settings for Tally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Number of store backups kept on disk
    #[serde(default = "default_backup_retention")]
    pub backup_retention: usize,

    /// Longest wait for the ledger or store lock, in milliseconds
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Default currency symbol
    #[serde(default = "default_currency")]
    pub currency_symbol: String,

    /// Rows per page in history views
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
}

fn default_schema_version() -> u32 {
    1
}

fn default_backup_retention() -> usize {
    10
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

fn default_currency() -> String {
    "$".to_string()
}

fn default_page_size() -> usize {
    20
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            backup_retention: default_backup_retention(),
            lock_timeout_ms: default_lock_timeout_ms(),
            currency_symbol: default_currency(),
            default_page_size: default_page_size(),
        }
    }
}

impl Settings {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Load settings from disk, or fall back to defaults if the file doesn't exist
    pub fn load_or_create(paths: &TallyPaths) -> PersistenceResult<Self> {
        let settings_path = paths.settings_file();

        if !settings_path.exists() {
            // Don't save yet - let caller decide when to persist
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(&settings_path)
            .map_err(|e| PersistenceError::Io(format!("Failed to read settings file: {}", e)))?;

        let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
            PersistenceError::Config(format!("Failed to parse settings file: {}", e))
        })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to disk
    pub fn save(&self, paths: &TallyPaths) -> PersistenceResult<()> {
        self.validate()?;
        paths.ensure_directories()?;
        write_json_atomic(paths.settings_file(), self)
    }

    /// Update one setting by name from text
    pub fn set(&mut self, key: &str, value: &str) -> PersistenceResult<()> {
        let invalid = |e: std::num::ParseIntError| {
            PersistenceError::Config(format!("Invalid value '{}' for {}: {}", value, key, e))
        };
        match key {
            "backup_retention" => self.backup_retention = value.parse().map_err(invalid)?,
            "lock_timeout_ms" => self.lock_timeout_ms = value.parse().map_err(invalid)?,
            "default_page_size" => self.default_page_size = value.parse().map_err(invalid)?,
            "currency_symbol" => self.currency_symbol = value.to_string(),
            _ => {
                return Err(PersistenceError::Config(format!(
                    "Unknown setting '{}'",
                    key
                )))
            }
        }
        self.validate()
    }

    fn validate(&self) -> PersistenceResult<()> {
        if self.backup_retention == 0 {
            return Err(PersistenceError::Config(
                "backup_retention must be at least 1".into(),
            ));
        }
        if self.default_page_size == 0 {
            return Err(PersistenceError::Config(
                "default_page_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
