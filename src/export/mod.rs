//! Export module for Tally
//!
//! Read-only export of transaction history:
//! - CSV: one row per transaction (spreadsheet-compatible)
//! - JSON: versioned envelope with a summary, machine-readable

pub mod csv;
pub mod json;

pub use csv::export_transactions_csv;
pub use json::{export_transactions_json, TransactionExport, EXPORT_SCHEMA_VERSION};
