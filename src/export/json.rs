//! JSON export functionality
//!
//! Exports history entries inside a versioned envelope with a summary.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{EngineResult, PersistenceError, TallyResult};
use crate::services::history::{summarize, HistoryEntry, HistorySummary};

/// Current export schema version
pub const EXPORT_SCHEMA_VERSION: &str = "1.0.0";

/// Transaction export structure
#[derive(Debug, Clone, Serialize)]
pub struct TransactionExport<'a> {
    /// Schema version for compatibility checking
    pub schema_version: &'static str,

    pub exported_at: DateTime<Utc>,

    /// Application version that created the export
    pub app_version: &'static str,

    pub username: &'a str,

    pub summary: HistorySummary,

    pub transactions: &'a [HistoryEntry],
}

impl<'a> TransactionExport<'a> {
    pub fn new(username: &'a str, entries: &'a [HistoryEntry]) -> EngineResult<Self> {
        Ok(Self {
            schema_version: EXPORT_SCHEMA_VERSION,
            exported_at: Utc::now(),
            app_version: env!("CARGO_PKG_VERSION"),
            username,
            summary: summarize(entries.iter().map(|e| &e.transaction))?,
            transactions: entries,
        })
    }
}

/// Export history entries to JSON
pub fn export_transactions_json<W: Write>(
    username: &str,
    entries: &[HistoryEntry],
    writer: &mut W,
    pretty: bool,
) -> TallyResult<usize> {
    let export = TransactionExport::new(username, entries)?;

    if pretty {
        serde_json::to_writer_pretty(&mut *writer, &export).map_err(PersistenceError::from)?;
    } else {
        serde_json::to_writer(&mut *writer, &export).map_err(PersistenceError::from)?;
    }
    writeln!(writer)?;

    Ok(entries.len())
}
