//! Cross-process lock on the data directory
//!
//! The lock is a file created with `create_new` semantics; whoever creates it
//! owns the store until the guard is dropped and the file removed. A lock
//! file older than [`STALE_AFTER`] is assumed to belong to a crashed process
//! and is reclaimed.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, warn};

use crate::error::{PersistenceError, PersistenceResult};

/// Age after which an existing lock file is considered abandoned
pub const STALE_AFTER: Duration = Duration::from_secs(60);

/// Retry policy for lock acquisition
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Maximum duration to wait for the lock
    pub max_wait: Duration,
    /// Initial delay between attempts
    pub initial_backoff: Duration,
    /// Cap for the exponential backoff
    pub max_backoff: Duration,
}

impl LockConfig {
    pub fn with_max_wait(max_wait: Duration) -> Self {
        Self {
            max_wait,
            ..Self::default()
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(250),
        }
    }
}

/// Guard for the store lock file. Dropping it releases the lock.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    file: Option<File>,
}

impl StoreLock {
    /// Acquire the lock, retrying with exponential backoff up to `max_wait`
    pub fn acquire(path: &Path, config: &LockConfig) -> PersistenceResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let start = Instant::now();
        let mut backoff = config.initial_backoff;

        loop {
            if let Some(lock) = Self::try_acquire(path)? {
                debug!(path = %path.display(), "store lock acquired");
                return Ok(lock);
            }

            if reclaim_if_stale(path) {
                continue;
            }

            let remaining = config.max_wait.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return Err(PersistenceError::LockTimeout {
                    path: path.to_path_buf(),
                    waited_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                });
            }

            thread::sleep(backoff.min(remaining));
            backoff = (backoff * 2).min(config.max_backoff);
        }
    }

    /// One attempt; `Ok(None)` if someone else holds the lock
    pub fn try_acquire(path: &Path) -> PersistenceResult<Option<Self>> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                // Owner info for whoever finds a leftover lock; non-fatal
                let _ = writeln!(
                    file,
                    "PID: {}\nTimestamp: {}",
                    std::process::id(),
                    chrono::Utc::now().to_rfc3339()
                );
                Ok(Some(Self {
                    path: path.to_path_buf(),
                    file: Some(file),
                }))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(PersistenceError::Io(format!(
                "Failed to create lock file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        drop(self.file.take());
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove store lock");
        }
    }
}

fn reclaim_if_stale(path: &Path) -> bool {
    let age = fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok());

    match age {
        Some(age) if age > STALE_AFTER => {
            warn!(
                path = %path.display(),
                age_secs = age.as_secs(),
                "reclaiming stale store lock"
            );
            fs::remove_file(path).is_ok()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn quick() -> LockConfig {
        LockConfig {
            max_wait: Duration::from_millis(60),
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_acquire_and_release() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ledger.lock");

        {
            let lock = StoreLock::acquire(&path, &quick()).unwrap();
            assert!(path.exists());
            assert_eq!(lock.path(), path);
        }

        assert!(!path.exists());
    }

    #[test]
    fn test_second_acquire_times_out() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ledger.lock");

        let _held = StoreLock::acquire(&path, &quick()).unwrap();
        let err = StoreLock::acquire(&path, &quick()).unwrap_err();

        assert!(matches!(err, PersistenceError::LockTimeout { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_try_acquire_reports_contention() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ledger.lock");

        let held = StoreLock::try_acquire(&path).unwrap();
        assert!(held.is_some());
        assert!(StoreLock::try_acquire(&path).unwrap().is_none());

        drop(held);
        assert!(StoreLock::try_acquire(&path).unwrap().is_some());
    }

    #[test]
    fn test_waiter_gets_lock_after_release() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ledger.lock");

        let held = StoreLock::acquire(&path, &quick()).unwrap();
        let waiter_path = path.clone();
        let waiter = thread::spawn(move || {
            StoreLock::acquire(&waiter_path, &LockConfig::with_max_wait(Duration::from_secs(5)))
                .map(|_| ())
        });

        thread::sleep(Duration::from_millis(30));
        drop(held);

        assert!(waiter.join().unwrap().is_ok());
    }
}
