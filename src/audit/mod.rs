//! Audit logging system for Tally
//!
//! Every ledger mutation, applied or rejected, is appended to a JSONL audit
//! log with the acting user, the accounts involved, the amount and the
//! outcome.
//!
//! - `AuditEntry`: one operation and its outcome
//! - `AuditLogger`: appends entries to the log file and reads them back

mod entry;
mod logger;

pub use entry::{AuditEntry, Operation, Outcome};
pub use logger::AuditLogger;
