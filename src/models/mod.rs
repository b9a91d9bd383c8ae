//! Core data models for Tally
//!
//! This module contains the value objects of the ledger: money, ids,
//! accounts, transactions, users, and the persisted snapshot.

pub mod account;
pub mod ids;
pub mod money;
pub mod snapshot;
pub mod transaction;
pub mod user;

pub use account::{Account, AccountKind};
pub use ids::{AccountId, TransactionId, TransferId};
pub use money::{Money, MoneyParseError};
pub use snapshot::{Ledger, SCHEMA_VERSION};
pub use transaction::{EntryDraft, Transaction, TransactionKind};
pub use user::{AccountRef, User};
