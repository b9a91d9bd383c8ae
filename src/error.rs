//! Custom error types for Tally
//!
//! Two families of errors are exposed: [`EngineError`] for the mutation engine
//! and history queries, and [`PersistenceError`] for the storage and backup
//! layers. Both are defined with thiserror and carry enough structured detail
//! to build an actionable message without re-querying the ledger.
//! [`TallyError`] wraps either one for callers that drive both layers.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::{AccountId, Money};

/// Errors raised by the mutation engine and read services
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Amount was zero, negative, or overflowed
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Source and destination of a transfer are the same account
    #[error("Cannot transfer to the same account ({0})")]
    SameAccountTransfer(AccountId),

    /// The account has been deactivated
    #[error("Account {account} is inactive")]
    AccountInactive { account: AccountId },

    /// No account matched the given reference
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// No user with the given name
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// No transfer with the given id among the user's accounts
    #[error("Transfer not found: {0}")]
    TransferNotFound(String),

    /// Debit would take the account below its overdraft limit
    #[error(
        "Insufficient funds in account {account}: requested {requested}, available {available}, short by {shortfall}"
    )]
    InsufficientFunds {
        account: AccountId,
        available: Money,
        requested: Money,
        shortfall: Money,
    },

    /// Duplicate entity errors
    #[error("{entity_type} already exists: {identifier}")]
    Duplicate {
        entity_type: &'static str,
        identifier: String,
    },

    /// Validation errors for caller input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Username/password pair did not verify
    #[error("Invalid credentials for user '{0}'")]
    InvalidCredentials(String),

    /// Could not acquire the ledger lock within the configured wait
    #[error("Timed out after {waited_ms}ms waiting for the ledger lock")]
    LockTimeout { waited_ms: u64 },
}

impl EngineError {
    /// Create a "not found" error for accounts
    pub fn account_not_found(identifier: impl Into<String>) -> Self {
        Self::AccountNotFound(identifier.into())
    }

    /// Create a "not found" error for users
    pub fn user_not_found(identifier: impl Into<String>) -> Self {
        Self::UserNotFound(identifier.into())
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::AccountNotFound(_) | Self::UserNotFound(_) | Self::TransferNotFound(_)
        )
    }

    /// Check if this error can be fixed by correcting the request
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount(_)
                | Self::SameAccountTransfer(_)
                | Self::AccountInactive { .. }
                | Self::AccountNotFound(_)
                | Self::Validation(_)
        )
    }

    /// Transient failures that may succeed if retried unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }
}

/// Errors raised by the persistence layer
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Snapshot could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Settings could not be read or resolved
    #[error("Configuration error: {0}")]
    Config(String),

    /// A store or backup file failed structural validation
    #[error("Integrity check failed for {}: {reason}", path.display())]
    Integrity { path: PathBuf, reason: String },

    /// Neither the primary store nor any backup could be loaded
    #[error("Store is unrecoverable: primary failed ({primary}) and {backups_tried} backup(s) were invalid")]
    UnrecoverableStore {
        primary: String,
        backups_tried: usize,
    },

    /// The requested backup does not exist
    #[error("Backup not found: {0}")]
    BackupNotFound(String),

    /// Could not acquire the store lock within the configured wait
    #[error("Timed out after {waited_ms}ms waiting for lock {}", path.display())]
    LockTimeout { path: PathBuf, waited_ms: u64 },
}

impl PersistenceError {
    /// Check if this error requires operator intervention
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnrecoverableStore { .. })
    }

    /// Transient failures that may succeed if retried unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::LockTimeout { .. })
    }
}

impl From<std::io::Error> for PersistenceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Either error family, for code that spans the engine and the store
#[derive(Error, Debug)]
pub enum TallyError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl TallyError {
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Engine(_) => false,
            Self::Persistence(e) => e.is_fatal(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Engine(e) => e.is_retryable(),
            Self::Persistence(e) => e.is_retryable(),
        }
    }
}

impl From<std::io::Error> for TallyError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence(err.into())
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type alias for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Result type alias spanning both layers
pub type TallyResult<T> = Result<T, TallyError>;
