//! Backup restoration for Tally
//!
//! Validates backups and finds the newest usable one when the primary store
//! is damaged. Restoring writes the chosen backup over the primary after
//! backing up whatever valid primary is there; retention is left to the
//! next save.

use std::fs;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::paths::TallyPaths;
use crate::error::{PersistenceError, PersistenceResult};
use crate::models::Ledger;
use crate::storage::file_io::write_bytes_atomic;
use crate::storage::integrity::check_snapshot;

use super::manager::{BackupInfo, BackupManager};

/// Handles validating and restoring from backups
pub struct RestoreManager<'a> {
    paths: &'a TallyPaths,
    backups: &'a BackupManager,
}

/// The newest backup that passed validation, and how many were tried
#[derive(Debug)]
pub struct NewestValid {
    pub found: Option<(BackupInfo, Ledger)>,
    /// Backups examined, including the one returned
    pub tried: usize,
}

impl<'a> RestoreManager<'a> {
    pub fn new(paths: &'a TallyPaths, backups: &'a BackupManager) -> Self {
        Self { paths, backups }
    }

    /// Validate a backup file without restoring it
    pub fn validate_backup(&self, backup: &BackupInfo) -> PersistenceResult<ValidationResult> {
        let (_, ledger) = self.read_valid(backup)?;
        Ok(ValidationResult::from_ledger(backup, &ledger))
    }

    /// Walk backups newest-first and decode the first valid one
    pub fn load_newest_valid(&self) -> PersistenceResult<NewestValid> {
        let mut tried = 0;

        for backup in self.backups.list_backups()? {
            tried += 1;
            match self.read_valid(&backup) {
                Ok((_, ledger)) => {
                    return Ok(NewestValid {
                        found: Some((backup, ledger)),
                        tried,
                    })
                }
                Err(e) => warn!(backup = %backup.filename, error = %e, "skipping invalid backup"),
            }
        }

        Ok(NewestValid { found: None, tried })
    }

    /// Restore a named backup, or the newest valid one, over the primary.
    ///
    /// The backup is validated first; the primary is only touched if it
    /// passes. Callers must hold the store lock.
    pub fn restore(&self, filename: Option<&str>) -> PersistenceResult<RestoreResult> {
        let (backup, bytes, ledger) = match filename {
            Some(name) => {
                let backup = self.backups.get_backup(name)?;
                let (bytes, ledger) = self.read_valid(&backup)?;
                (backup, bytes, ledger)
            }
            None => {
                let newest = self.load_newest_valid()?;
                let (backup, ledger) = newest.found.ok_or_else(|| {
                    PersistenceError::BackupNotFound("no valid backup available".into())
                })?;
                let bytes = fs::read(&backup.path)?;
                (backup, bytes, ledger)
            }
        };

        // Keep the state being replaced so a restore can itself be undone.
        // No pruning here: the restored backup may be the oldest one.
        let rotation = self.backups.backup_primary(&self.paths.ledger_file())?;
        write_bytes_atomic(self.paths.ledger_file(), &bytes)?;

        info!(backup = %backup.filename, "restored store from backup");

        Ok(RestoreResult {
            validation: ValidationResult::from_ledger(&backup, &ledger),
            previous_saved_as: rotation.created.map(|b| b.filename),
            ledger,
        })
    }

    fn read_valid(&self, backup: &BackupInfo) -> PersistenceResult<(Vec<u8>, Ledger)> {
        let bytes = fs::read(&backup.path).map_err(|e| PersistenceError::Integrity {
            path: backup.path.clone(),
            reason: format!("unreadable: {}", e),
        })?;
        let ledger = check_snapshot(&bytes).map_err(|reason| PersistenceError::Integrity {
            path: backup.path.clone(),
            reason,
        })?;
        Ok((bytes, ledger))
    }
}

/// Result of a restore operation
#[derive(Debug)]
pub struct RestoreResult {
    pub validation: ValidationResult,
    /// Backup made of the primary that was replaced, if it was valid
    pub previous_saved_as: Option<String>,
    /// The restored ledger
    pub ledger: Ledger,
}

impl RestoreResult {
    pub fn summary(&self) -> String {
        let mut summary = format!("Restored {}", self.validation.summary());
        if let Some(previous) = &self.previous_saved_as {
            summary.push_str(&format!("; previous store saved as {}", previous));
        }
        summary
    }
}

/// Result of validating a backup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub filename: String,
    pub saved_at: Option<DateTime<Utc>>,
    pub user_count: usize,
    pub account_count: usize,
    pub transaction_count: usize,
}

impl ValidationResult {
    fn from_ledger(backup: &BackupInfo, ledger: &Ledger) -> Self {
        Self {
            filename: backup.filename.clone(),
            saved_at: ledger.saved_at,
            user_count: ledger.user_count(),
            account_count: ledger.users().map(|u| u.accounts().len()).sum(),
            transaction_count: ledger.transaction_count(),
        }
    }

    /// Get a summary of what the backup holds
    pub fn summary(&self) -> String {
        format!(
            "{}: {} user(s), {} account(s), {} transaction(s)",
            self.filename, self.user_count, self.account_count, self.transaction_count
        )
    }
}
