//! Backup manager for Tally
//!
//! Every save copies the current primary store into the backup directory
//! before replacing it, then prunes down to the configured retention.
//! Backups are named `ledger-YYYYMMDD-HHMMSS-mmm-NNNNNN.json`; the trailing
//! sequence number orders backups even when two land in the same millisecond.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::paths::TallyPaths;
use crate::error::{PersistenceError, PersistenceResult};
use crate::storage::file_io::{read_optional, write_bytes_atomic};
use crate::storage::integrity::check_snapshot;

const PREFIX: &str = "ledger-";
const SUFFIX: &str = ".json";

/// Metadata about a backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupInfo {
    /// Backup filename
    pub filename: String,
    /// Full path to backup
    pub path: PathBuf,
    /// When the backup was created
    pub created_at: DateTime<Utc>,
    /// Creation order; higher is newer
    pub sequence: u64,
    /// Size in bytes
    pub size_bytes: u64,
}

/// What a rotation did
#[derive(Debug, Default)]
pub struct RotationReport {
    /// Backup made from the previous primary, if there was a valid one
    pub created: Option<BackupInfo>,
    /// Why no backup was made, when the primary existed but was unusable
    pub skipped: Option<String>,
    /// Backups removed by retention
    pub pruned: Vec<PathBuf>,
}

/// Manages backup creation and retention
#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_dir: PathBuf,
    retention: usize,
}

impl BackupManager {
    pub fn new(paths: &TallyPaths, retention: usize) -> Self {
        Self {
            backup_dir: paths.backup_dir(),
            retention,
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Copy `bytes` into a new backup file
    pub fn create_backup(&self, bytes: &[u8]) -> PersistenceResult<BackupInfo> {
        fs::create_dir_all(&self.backup_dir).map_err(|e| {
            PersistenceError::Io(format!("Failed to create backup directory: {}", e))
        })?;

        // Millisecond precision, matching what the filename can carry
        let now = Utc::now();
        let now = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);
        let sequence = self.next_sequence()?;
        let filename = format!(
            "{}{}-{:03}-{:06}{}",
            PREFIX,
            now.format("%Y%m%d-%H%M%S"),
            now.timestamp_subsec_millis(),
            sequence,
            SUFFIX
        );
        let path = self.backup_dir.join(&filename);

        write_bytes_atomic(&path, bytes)?;
        debug!(backup = %filename, "backup written");

        Ok(BackupInfo {
            filename,
            path,
            created_at: now,
            sequence,
            size_bytes: bytes.len() as u64,
        })
    }

    /// Back up the current primary (if present and valid), then prune
    pub fn rotate(&self, primary: &Path) -> PersistenceResult<RotationReport> {
        let mut report = self.backup_primary(primary)?;
        report.pruned = self.enforce_retention()?;
        Ok(report)
    }

    /// Back up the current primary (if present and valid) without pruning
    pub fn backup_primary(&self, primary: &Path) -> PersistenceResult<RotationReport> {
        let mut report = RotationReport::default();

        if let Some(bytes) = read_optional(primary)? {
            match check_snapshot(&bytes) {
                Ok(_) => report.created = Some(self.create_backup(&bytes)?),
                Err(reason) => {
                    warn!(
                        primary = %primary.display(),
                        %reason,
                        "current store is invalid; not backing it up"
                    );
                    report.skipped = Some(reason);
                }
            }
        }

        Ok(report)
    }

    /// List all available backups, newest first
    pub fn list_backups(&self) -> PersistenceResult<Vec<BackupInfo>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();

        for entry in fs::read_dir(&self.backup_dir).map_err(|e| {
            PersistenceError::Io(format!("Failed to read backup directory: {}", e))
        })? {
            let entry = entry.map_err(|e| {
                PersistenceError::Io(format!("Failed to read directory entry: {}", e))
            })?;

            if let Some(info) = parse_backup_info(&entry.path()) {
                backups.push(info);
            }
        }

        backups.sort_by(|a, b| b.sequence.cmp(&a.sequence));

        Ok(backups)
    }

    /// Delete backups beyond the retention count, oldest first
    pub fn enforce_retention(&self) -> PersistenceResult<Vec<PathBuf>> {
        self.prune_to(self.retention)
    }

    /// Keep only the `keep` newest backups
    pub fn prune_to(&self, keep: usize) -> PersistenceResult<Vec<PathBuf>> {
        let backups = self.list_backups()?;
        let mut deleted = Vec::new();

        for backup in backups.into_iter().skip(keep).rev() {
            fs::remove_file(&backup.path).map_err(|e| {
                PersistenceError::Io(format!(
                    "Failed to delete old backup {}: {}",
                    backup.filename, e
                ))
            })?;
            deleted.push(backup.path);
        }

        if !deleted.is_empty() {
            info!(count = deleted.len(), keep, "pruned old backups");
        }

        Ok(deleted)
    }

    /// Get a specific backup by filename
    ///
    /// Only bare filenames inside the backup directory are accepted.
    pub fn get_backup(&self, filename: &str) -> PersistenceResult<BackupInfo> {
        let bare = Path::new(filename).file_name().and_then(|n| n.to_str()) == Some(filename);
        if !bare || filename.contains(['/', '\\']) || filename.contains("..") {
            return Err(PersistenceError::BackupNotFound(filename.to_string()));
        }

        let path = self.backup_dir.join(filename);
        if !path.is_file() {
            return Err(PersistenceError::BackupNotFound(filename.to_string()));
        }
        parse_backup_info(&path)
            .ok_or_else(|| PersistenceError::BackupNotFound(filename.to_string()))
    }

    /// Get the most recent backup
    pub fn get_latest_backup(&self) -> PersistenceResult<Option<BackupInfo>> {
        Ok(self.list_backups()?.into_iter().next())
    }

    fn next_sequence(&self) -> PersistenceResult<u64> {
        Ok(self
            .list_backups()?
            .first()
            .map_or(1, |latest| latest.sequence + 1))
    }
}

/// Parse backup info from a backup path; `None` for foreign files
fn parse_backup_info(path: &Path) -> Option<BackupInfo> {
    let filename = path.file_name()?.to_str()?.to_string();
    let stem = filename.strip_prefix(PREFIX)?.strip_suffix(SUFFIX)?;

    let parts: Vec<&str> = stem.split('-').collect();
    let [date, time, millis, sequence] = parts.as_slice() else {
        return None;
    };

    let created_at = parse_backup_timestamp(date, time, millis)?;
    let sequence: u64 = sequence.parse().ok()?;
    let size_bytes = fs::metadata(path).ok()?.len();

    Some(BackupInfo {
        filename,
        path: path.to_path_buf(),
        created_at,
        sequence,
        size_bytes,
    })
}

fn parse_backup_timestamp(date: &str, time: &str, millis: &str) -> Option<DateTime<Utc>> {
    if date.len() != 8 || time.len() != 6 || millis.len() != 3 {
        return None;
    }

    let year: i32 = date[0..4].parse().ok()?;
    let month: u32 = date[4..6].parse().ok()?;
    let day: u32 = date[6..8].parse().ok()?;
    let hour: u32 = time[0..2].parse().ok()?;
    let minute: u32 = time[2..4].parse().ok()?;
    let second: u32 = time[4..6].parse().ok()?;
    let millis: u32 = millis.parse().ok()?;

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_milli_opt(hour, minute, second, millis)?;

    Some(DateTime::from_naive_utc_and_offset(
        NaiveDateTime::new(date, time),
        Utc,
    ))
}
