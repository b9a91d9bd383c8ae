//! Tally - file-backed personal ledger
//!
//! This library provides the core of the Tally ledger: users own savings,
//! current and salary accounts whose balances move only through recorded
//! transactions. The whole ledger lives in one JSON store that is written
//! atomically with rotating backups.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `models`: Entities (users, accounts, transactions) and the snapshot
//! - `services`: Mutation engine and history queries
//! - `storage`: Save pipeline, load with backup recovery, store lock
//! - `backup`: Backup rotation, validation and restore
//! - `audit`: JSONL audit log of applied and rejected mutations
//! - `auth`: Password hashing and verification
//! - `reports`, `export`, `display`: Statements, CSV/JSON export, terminal output
//! - `config`: Paths and persisted settings
//! - `error`: Engine and persistence error types
//!
//! # Example
//!
//! ```rust,ignore
//! use tally::config::{Settings, TallyPaths};
//! use tally::storage::Storage;
//!
//! let paths = TallyPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let (storage, report) = Storage::open(paths, settings)?;
//! ```

pub mod audit;
pub mod auth;
pub mod backup;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod models;
pub mod reports;
pub mod services;
pub mod storage;

pub use error::{EngineError, PersistenceError, TallyError, TallyResult};
pub use storage::Storage;
