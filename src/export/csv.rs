//! CSV export functionality
//!
//! Writes history entries as spreadsheet-friendly rows, one per transaction.

use std::io::Write;

use serde::Serialize;

use crate::error::{PersistenceError, PersistenceResult};
use crate::services::HistoryEntry;

/// One CSV row; amounts are plain decimals with sign
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "Account ID")]
    account_id: String,
    #[serde(rename = "Account")]
    account: &'a str,
    #[serde(rename = "Kind")]
    kind: &'static str,
    #[serde(rename = "Amount")]
    amount: String,
    #[serde(rename = "Balance After")]
    balance_after: String,
    #[serde(rename = "Memo")]
    memo: &'a str,
    #[serde(rename = "Transfer ID")]
    transfer_id: String,
    #[serde(rename = "Counterparty")]
    counterparty: String,
}

impl<'a> From<&'a HistoryEntry> for CsvRow<'a> {
    fn from(entry: &'a HistoryEntry) -> Self {
        let txn = &entry.transaction;
        Self {
            id: txn.id.as_uuid().to_string(),
            timestamp: txn.created_at.to_rfc3339(),
            account_id: entry.account_id.as_uuid().to_string(),
            account: &entry.account_name,
            kind: txn.kind.as_str(),
            amount: txn.signed_amount().to_decimal_string(),
            balance_after: txn.balance_after.to_decimal_string(),
            memo: txn.memo.as_deref().unwrap_or(""),
            transfer_id: txn
                .transfer_id
                .map(|id| id.as_uuid().to_string())
                .unwrap_or_default(),
            counterparty: txn
                .counterparty
                .map(|id| id.as_uuid().to_string())
                .unwrap_or_default(),
        }
    }
}

/// Export history entries to CSV, header row first
pub fn export_transactions_csv<W: Write>(
    entries: &[HistoryEntry],
    writer: W,
) -> PersistenceResult<usize> {
    let mut csv_writer = ::csv::Writer::from_writer(writer);

    if entries.is_empty() {
        csv_writer
            .write_record([
                "ID",
                "Timestamp",
                "Account ID",
                "Account",
                "Kind",
                "Amount",
                "Balance After",
                "Memo",
                "Transfer ID",
                "Counterparty",
            ])
            .map_err(csv_error)?;
    }

    for entry in entries {
        csv_writer.serialize(CsvRow::from(entry)).map_err(csv_error)?;
    }

    csv_writer
        .flush()
        .map_err(|e| PersistenceError::Io(format!("Failed to flush CSV export: {}", e)))?;

    Ok(entries.len())
}

fn csv_error(e: ::csv::Error) -> PersistenceError {
    if e.is_io_error() {
        PersistenceError::Io(format!("CSV export failed: {}", e))
    } else {
        PersistenceError::Serialization(format!("CSV export failed: {}", e))
    }
}
