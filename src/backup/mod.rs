//! Backup system for Tally
//!
//! Provides rolling backups of the primary store and restore functionality.
//!
//! # Architecture
//!
//! - `BackupManager`: creates backups from the current primary and enforces
//!   the retention count
//! - `RestoreManager`: validates backups, finds the newest valid one, and
//!   restores it over the primary
//!
//! # Retention Policy
//!
//! The newest `backup_retention` backups are kept (10 by default); older ones
//! are deleted oldest-first after each rotation.

mod manager;
mod restore;

pub use manager::{BackupInfo, BackupManager, RotationReport};
pub use restore::{NewestValid, RestoreManager, RestoreResult, ValidationResult};
