//! Storage layer for Tally
//!
//! [`Storage`] owns the in-memory ledger behind a single `RwLock` and moves
//! it to and from disk. Saving is a three stage pipeline:
//!
//! 1. serialize the snapshot and verify the bytes pass integrity checks
//! 2. rotate: back up the current primary and prune old backups
//! 3. atomically replace the primary (temp file, fsync, rename)
//!
//! A failure at any stage leaves the previous primary untouched. Loading
//! falls back to the newest valid backup when the primary is damaged.
//!
//! A process that loads, mutates and saves must open with
//! [`Storage::open_exclusive`], which holds the store lock from before the
//! load until the storage is dropped. Another process doing the same waits
//! for the lock and then loads the committed result.

pub mod file_io;
pub mod integrity;
pub mod lock;

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, warn};

use crate::audit::{AuditEntry, AuditLogger, Operation};
use crate::backup::{BackupInfo, BackupManager, RestoreManager, RestoreResult};
use crate::config::{Settings, TallyPaths};
use crate::error::{EngineError, EngineResult, PersistenceError, PersistenceResult};
use crate::models::Ledger;

use file_io::{read_optional, write_bytes_atomic};
use integrity::check_snapshot;
use lock::{LockConfig, StoreLock};

/// Where the in-memory ledger came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSource {
    /// The primary store file
    Primary,
    /// No store and no backups: a first run
    Fresh,
    /// A backup file, named here
    Backup(String),
}

/// Advisory raised when the primary store could not be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredFromBackup {
    /// Filename of the backup that was loaded
    pub backup: String,
    /// Why the primary was rejected
    pub reason: String,
}

impl fmt::Display for RecoveredFromBackup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "primary store unusable ({}); recovered from backup {}",
            self.reason, self.backup
        )
    }
}

/// Outcome of a successful load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub source: LoadSource,
    pub recovered: Option<RecoveredFromBackup>,
    pub user_count: usize,
    pub transaction_count: usize,
}

/// Outcome of a successful save
#[derive(Debug, Clone)]
pub struct SaveReport {
    pub saved_at: DateTime<Utc>,
    /// Backup made of the previous primary
    pub backup: Option<BackupInfo>,
    /// Number of backups removed by retention
    pub pruned: usize,
    pub bytes_written: usize,
}

/// Coordinates the in-memory ledger, the store file, and backups
pub struct Storage {
    paths: TallyPaths,
    settings: Settings,
    ledger: RwLock<Ledger>,
    backups: BackupManager,
    audit: AuditLogger,
    /// Store lock held for the whole session by `open_exclusive`
    session_lock: Option<StoreLock>,
}

impl Storage {
    /// Create storage with an empty in-memory ledger. Nothing is read yet.
    pub fn new(paths: TallyPaths, settings: Settings) -> PersistenceResult<Self> {
        paths.ensure_directories()?;

        Ok(Self {
            backups: BackupManager::new(&paths, settings.backup_retention),
            audit: AuditLogger::new(paths.audit_log()),
            ledger: RwLock::new(Ledger::new()),
            session_lock: None,
            settings,
            paths,
        })
    }

    /// Create storage and load the ledger from disk
    pub fn open(paths: TallyPaths, settings: Settings) -> PersistenceResult<(Self, LoadReport)> {
        let storage = Self::new(paths, settings)?;
        let report = storage.load()?;
        Ok((storage, report))
    }

    /// Take the store lock, then load, keeping the lock until drop.
    ///
    /// Saves made through this storage reuse the held lock, so no other
    /// process can write between this load and those saves.
    pub fn open_exclusive(
        paths: TallyPaths,
        settings: Settings,
    ) -> PersistenceResult<(Self, LoadReport)> {
        let mut storage = Self::new(paths, settings)?;
        storage.session_lock = Some(storage.acquire_store_lock()?);
        debug!("store lock held for session");

        let report = storage.load()?;
        Ok((storage, report))
    }

    /// Whether this storage holds the store lock for its whole lifetime
    pub fn is_exclusive(&self) -> bool {
        self.session_lock.is_some()
    }

    pub fn paths(&self) -> &TallyPaths {
        &self.paths
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    pub fn audit_log(&self) -> &AuditLogger {
        &self.audit
    }

    /// Shared access to the ledger, waiting at most `lock_timeout_ms`
    pub fn read(&self) -> EngineResult<RwLockReadGuard<'_, Ledger>> {
        self.ledger
            .try_read_for(self.settings.lock_timeout())
            .ok_or(EngineError::LockTimeout {
                waited_ms: self.settings.lock_timeout_ms,
            })
    }

    /// Exclusive access to the ledger, waiting at most `lock_timeout_ms`
    pub fn write(&self) -> EngineResult<RwLockWriteGuard<'_, Ledger>> {
        self.ledger
            .try_write_for(self.settings.lock_timeout())
            .ok_or(EngineError::LockTimeout {
                waited_ms: self.settings.lock_timeout_ms,
            })
    }

    /// Record an audit entry. Audit failures never undo a mutation.
    pub fn record(&self, entry: AuditEntry) {
        if let Err(e) = self.audit.log(&entry) {
            warn!(error = %e, operation = %entry.operation, "failed to write audit entry");
        }
    }

    /// Replace the in-memory ledger with the persisted one.
    ///
    /// Tries the primary store first, then backups newest-first. Only
    /// `UnrecoverableStore` means nothing usable was found.
    pub fn load(&self) -> PersistenceResult<LoadReport> {
        let mut guard = self.write_for_persistence()?;
        let primary = self.paths.ledger_file();

        let primary_failure = match read_optional(&primary) {
            Ok(Some(bytes)) => match check_snapshot(&bytes) {
                Ok(ledger) => {
                    *guard = ledger;
                    debug!(path = %primary.display(), "loaded primary store");
                    return Ok(report(&guard, LoadSource::Primary, None));
                }
                Err(reason) => reason,
            },
            Ok(None) => {
                if self.backups.list_backups()?.is_empty() {
                    *guard = Ledger::new();
                    info!("no store found; starting with an empty ledger");
                    return Ok(report(&guard, LoadSource::Fresh, None));
                }
                "primary store is missing".to_string()
            }
            Err(e) => e.to_string(),
        };

        warn!(path = %primary.display(), reason = %primary_failure, "primary store unusable");

        let newest = RestoreManager::new(&self.paths, &self.backups).load_newest_valid()?;
        match newest.found {
            Some((backup, ledger)) => {
                let advisory = RecoveredFromBackup {
                    backup: backup.filename.clone(),
                    reason: primary_failure,
                };
                warn!(backup = %advisory.backup, "recovered ledger from backup");
                *guard = ledger;
                Ok(report(&guard, LoadSource::Backup(backup.filename), Some(advisory)))
            }
            None => {
                error!(
                    backups_tried = newest.tried,
                    "no valid store or backup; ledger is unrecoverable"
                );
                Err(PersistenceError::UnrecoverableStore {
                    primary: primary_failure,
                    backups_tried: newest.tried,
                })
            }
        }
    }

    /// Persist the ledger: serialize, rotate backups, atomically replace.
    ///
    /// Holds the read lock throughout, so the snapshot includes every
    /// mutation that completed before the call.
    pub fn save(&self) -> PersistenceResult<SaveReport> {
        let guard = self
            .ledger
            .try_read_for(self.settings.lock_timeout())
            .ok_or_else(|| self.lock_timeout_error())?;
        let _store_lock = self.store_lock()?;

        let saved_at = Utc::now();
        let bytes = serialize_snapshot(&guard, saved_at)?;
        let rotation = self.backups.rotate(&self.paths.ledger_file())?;
        write_bytes_atomic(self.paths.ledger_file(), &bytes)?;

        debug!(
            bytes = bytes.len(),
            backup = rotation.created.as_ref().map(|b| b.filename.as_str()),
            "ledger saved"
        );

        Ok(SaveReport {
            saved_at,
            backup: rotation.created,
            pruned: rotation.pruned.len(),
            bytes_written: bytes.len(),
        })
    }

    pub fn list_backups(&self) -> PersistenceResult<Vec<BackupInfo>> {
        self.backups.list_backups()
    }

    /// Restore a named backup (or the newest valid one) and reload from it
    pub fn restore_backup(&self, filename: Option<&str>) -> PersistenceResult<RestoreResult> {
        let mut guard = self.write_for_persistence()?;
        let _store_lock = self.store_lock()?;

        let result = RestoreManager::new(&self.paths, &self.backups).restore(filename)?;
        *guard = result.ledger.clone();

        self.record(
            AuditEntry::applied("", Operation::Restore).with_detail(result.validation.summary()),
        );
        Ok(result)
    }

    /// Delete all but the `keep` newest backups
    pub fn prune_backups(&self, keep: usize) -> PersistenceResult<Vec<PathBuf>> {
        let _store_lock = self.store_lock()?;
        let deleted = self.backups.prune_to(keep)?;

        self.record(
            AuditEntry::applied("", Operation::Prune)
                .with_detail(format!("kept {}, removed {}", keep, deleted.len())),
        );
        Ok(deleted)
    }

    fn write_for_persistence(&self) -> PersistenceResult<RwLockWriteGuard<'_, Ledger>> {
        self.ledger
            .try_write_for(self.settings.lock_timeout())
            .ok_or_else(|| self.lock_timeout_error())
    }

    /// Lock for one persistence step; `None` when the session already holds it
    fn store_lock(&self) -> PersistenceResult<Option<StoreLock>> {
        if self.session_lock.is_some() {
            return Ok(None);
        }
        self.acquire_store_lock().map(Some)
    }

    fn acquire_store_lock(&self) -> PersistenceResult<StoreLock> {
        StoreLock::acquire(
            &self.paths.lock_file(),
            &LockConfig::with_max_wait(self.settings.lock_timeout()),
        )
    }

    fn lock_timeout_error(&self) -> PersistenceError {
        PersistenceError::LockTimeout {
            path: self.paths.ledger_file(),
            waited_ms: self.settings.lock_timeout_ms,
        }
    }
}

/// Stage one of the save pipeline: encode and self-check the snapshot
pub fn serialize_snapshot(ledger: &Ledger, saved_at: DateTime<Utc>) -> PersistenceResult<Vec<u8>> {
    let mut value = serde_json::to_value(ledger)?;
    value["saved_at"] = serde_json::to_value(saved_at)?;

    let bytes = serde_json::to_vec_pretty(&value)?;
    check_snapshot(&bytes).map_err(|reason| {
        PersistenceError::Serialization(format!("snapshot failed self-check: {}", reason))
    })?;

    Ok(bytes)
}

fn report(
    ledger: &Ledger,
    source: LoadSource,
    recovered: Option<RecoveredFromBackup>,
) -> LoadReport {
    LoadReport {
        source,
        recovered,
        user_count: ledger.user_count(),
        transaction_count: ledger.transaction_count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, AccountKind, AccountRef, Money, User};
    use std::fs;
    use tempfile::TempDir;

    fn create_storage(retention: usize) -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let paths = TallyPaths::with_base_dir(temp_dir.path().to_path_buf());
        let settings = Settings {
            backup_retention: retention,
            lock_timeout_ms: 200,
            ..Settings::default()
        };
        (Storage::new(paths, settings).unwrap(), temp_dir)
    }

    fn reopen(storage: &Storage) -> (Storage, LoadReport) {
        Storage::open(storage.paths().clone(), storage.settings().clone()).unwrap()
    }

    fn seed(storage: &Storage, username: &str, cents: i64) {
        let mut ledger = storage.write().unwrap();
        let mut user = User::new(username, "hash", "someone@example.com").unwrap();
        user.add_account(
            Account::open(AccountKind::Savings, None, Money::from_cents(cents), Money::zero())
                .unwrap(),
        )
        .unwrap();
        ledger.add_user(user).unwrap();
    }

    #[test]
    fn test_storage_creation() {
        let (storage, temp_dir) = create_storage(10);

        assert!(temp_dir.path().join("data").exists());
        assert!(temp_dir.path().join("backups").exists());
        assert!(storage.read().unwrap().is_empty());
    }

    #[test]
    fn test_fresh_load() {
        let (storage, _temp) = create_storage(10);
        let report = storage.load().unwrap();

        assert_eq!(report.source, LoadSource::Fresh);
        assert!(report.recovered.is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let (storage, _temp) = create_storage(10);
        seed(&storage, "alice", 10000);
        storage.save().unwrap();

        let (reloaded, report) = reopen(&storage);
        assert_eq!(report.source, LoadSource::Primary);
        assert_eq!(report.user_count, 1);
        assert_eq!(report.transaction_count, 1);

        let ledger = reloaded.read().unwrap();
        let alice = ledger.user("alice").unwrap();
        assert_eq!(alice.total_balance(), Money::from_cents(10000));
        assert!(ledger.saved_at.is_some());
    }

    #[test]
    fn test_first_save_makes_no_backup() {
        let (storage, _temp) = create_storage(10);
        let report = storage.save().unwrap();

        assert!(report.backup.is_none());
        assert!(storage.list_backups().unwrap().is_empty());
        assert!(!storage.paths().lock_file().exists());
    }

    #[test]
    fn test_backup_rotation_keeps_newest() {
        let (storage, _temp) = create_storage(10);

        // 12 saves: the first has no previous primary, the rest back one up
        for _ in 0..12 {
            storage.save().unwrap();
        }

        let backups = storage.list_backups().unwrap();
        assert_eq!(backups.len(), 10);
        let sequences: Vec<u64> = backups.iter().map(|b| b.sequence).collect();
        assert_eq!(sequences, (2..=11).rev().collect::<Vec<u64>>());
    }

    #[test]
    fn test_recovers_from_corrupt_primary() {
        let (storage, _temp) = create_storage(10);
        seed(&storage, "alice", 500);
        storage.save().unwrap();
        storage.save().unwrap();

        fs::write(storage.paths().ledger_file(), b"{\"schema_version\": 1, \"us").unwrap();

        let (reloaded, report) = reopen(&storage);
        let advisory = report.recovered.unwrap();
        assert!(advisory.reason.contains("not valid JSON"));
        assert_eq!(report.source, LoadSource::Backup(advisory.backup.clone()));
        assert!(reloaded.read().unwrap().contains_user("alice"));

        // Recovery does not rewrite the damaged primary
        assert_eq!(
            fs::read(reloaded.paths().ledger_file()).unwrap(),
            b"{\"schema_version\": 1, \"us"
        );
    }

    #[test]
    fn test_recovers_when_primary_missing_but_backups_exist() {
        let (storage, _temp) = create_storage(10);
        seed(&storage, "alice", 500);
        storage.save().unwrap();
        storage.save().unwrap();
        fs::remove_file(storage.paths().ledger_file()).unwrap();

        let (_, report) = reopen(&storage);
        assert_eq!(report.recovered.unwrap().reason, "primary store is missing");
    }

    #[test]
    fn test_unrecoverable_store() {
        let (storage, _temp) = create_storage(10);
        storage.save().unwrap();
        storage.save().unwrap();

        fs::write(storage.paths().ledger_file(), b"garbage").unwrap();
        for backup in storage.list_backups().unwrap() {
            fs::write(&backup.path, b"garbage").unwrap();
        }

        let err = storage.load().unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            PersistenceError::UnrecoverableStore { backups_tried: 1, .. }
        ));
    }

    #[test]
    fn test_save_blocked_by_foreign_lock_leaves_primary() {
        let (storage, _temp) = create_storage(10);
        seed(&storage, "alice", 100);
        storage.save().unwrap();
        let before = fs::read(storage.paths().ledger_file()).unwrap();

        let _foreign = StoreLock::try_acquire(&storage.paths().lock_file())
            .unwrap()
            .unwrap();
        seed(&storage, "bob", 100);

        let err = storage.save().unwrap_err();
        assert!(matches!(err, PersistenceError::LockTimeout { .. }));
        assert_eq!(fs::read(storage.paths().ledger_file()).unwrap(), before);
    }

    fn withdraw(storage: &Storage, cents: i64) -> EngineResult<Money> {
        let mut ledger = storage.write()?;
        ledger
            .user_mut("alice")?
            .account_mut(&AccountRef::from("savings"))?
            .debit(Money::from_cents(cents))
    }

    #[test]
    fn test_exclusive_open_blocks_second_session() {
        let (storage, _temp) = create_storage(10);
        seed(&storage, "alice", 10000);
        storage.save().unwrap();

        let (first, _) =
            Storage::open_exclusive(storage.paths().clone(), storage.settings().clone()).unwrap();
        assert!(first.is_exclusive());
        assert!(storage.paths().lock_file().exists());

        let err = Storage::open_exclusive(storage.paths().clone(), storage.settings().clone())
            .err()
            .unwrap();
        assert!(matches!(err, PersistenceError::LockTimeout { .. }));

        drop(first);
        assert!(!storage.paths().lock_file().exists());
    }

    #[test]
    fn test_exclusive_sessions_do_not_lose_withdrawals() {
        let (storage, _temp) = create_storage(10);
        seed(&storage, "alice", 10000);
        storage.save().unwrap();
        let paths = storage.paths().clone();
        let settings = Settings {
            lock_timeout_ms: 5_000,
            ..storage.settings().clone()
        };

        let (first, _) = Storage::open_exclusive(paths.clone(), settings.clone()).unwrap();
        withdraw(&first, 6000).unwrap();

        std::thread::scope(|s| {
            let second = s.spawn(|| {
                let (second, _) = Storage::open_exclusive(paths.clone(), settings.clone())?;
                let result = withdraw(&second, 6000);
                second.save()?;
                let ledger = second.read()?.clone();
                Ok::<_, crate::error::TallyError>((result, ledger))
            });

            // The second session waits for this save before it loads
            std::thread::sleep(std::time::Duration::from_millis(100));
            first.save().unwrap();
            drop(first);

            let (result, ledger) = second.join().unwrap().unwrap();
            assert!(matches!(result, Err(EngineError::InsufficientFunds { .. })));
            let account = &ledger.user("alice").unwrap().accounts()[0];
            assert_eq!(account.balance(), Money::from_cents(4000));
            assert_eq!(account.transactions().len(), 2);
        });

        let (reloaded, _) = reopen(&storage);
        let ledger = reloaded.read().unwrap();
        let account = &ledger.user("alice").unwrap().accounts()[0];
        assert_eq!(account.balance(), Money::from_cents(4000));
        assert_eq!(account.transactions().len(), 2);
    }

    #[test]
    fn test_exclusive_session_restores_and_prunes_under_held_lock() {
        let (storage, _temp) = create_storage(10);
        for _ in 0..3 {
            storage.save().unwrap();
        }

        let (session, _) =
            Storage::open_exclusive(storage.paths().clone(), storage.settings().clone()).unwrap();
        session.save().unwrap();
        session.restore_backup(None).unwrap();
        assert_eq!(session.prune_backups(1).unwrap().len(), 3);
        assert!(session.paths().lock_file().exists());
    }

    #[test]
    fn test_write_lock_timeout_is_reported() {
        let (storage, _temp) = create_storage(10);
        let _held = storage.write().unwrap();

        std::thread::scope(|s| {
            let result = s.spawn(|| storage.read().map(|_| ())).join().unwrap();
            assert_eq!(result, Err(EngineError::LockTimeout { waited_ms: 200 }));
        });
    }

    #[test]
    fn test_restore_backup_replaces_memory() {
        let (storage, _temp) = create_storage(10);
        seed(&storage, "alice", 100);
        storage.save().unwrap();
        storage.save().unwrap();
        let first_backup = storage.list_backups().unwrap().pop().unwrap();

        seed(&storage, "bob", 100);
        storage.save().unwrap();

        let result = storage.restore_backup(Some(&first_backup.filename)).unwrap();
        assert_eq!(result.validation.user_count, 1);

        let ledger = storage.read().unwrap();
        assert!(ledger.contains_user("alice"));
        assert!(!ledger.contains_user("bob"));
    }

    #[test]
    fn test_prune_backups() {
        let (storage, _temp) = create_storage(10);
        for _ in 0..5 {
            storage.save().unwrap();
        }

        let deleted = storage.prune_backups(1).unwrap();
        assert_eq!(deleted.len(), 3);
        assert_eq!(storage.list_backups().unwrap().len(), 1);

        let audit = storage.audit_log().read_all().unwrap();
        assert_eq!(audit.last().unwrap().operation, Operation::Prune);
    }

    #[test]
    fn test_serialize_snapshot_sets_saved_at() {
        let saved_at = Utc::now();
        let bytes = serialize_snapshot(&Ledger::new(), saved_at).unwrap();
        let ledger = check_snapshot(&bytes).unwrap();
        assert_eq!(ledger.saved_at, Some(saved_at));
    }
}
