//! Service layer for Tally
//!
//! Services run validation and mutation against the ledger held by
//! [`Storage`](crate::storage::Storage), record every mutation in the audit
//! log, and leave persisting to the caller.

pub mod account;
pub mod batch;
pub mod history;
pub mod ledger;

pub use account::AccountService;
pub use batch::{
    read_batch_file, write_template, BatchFormat, BatchItem, BatchOperation, BatchReport,
    BatchService, ItemOutcome, ItemStatus, OperationCounts,
};
pub use history::{
    HistoryEntry, HistoryFilter, HistoryPage, HistoryService, HistorySummary, KindTotal, Page,
    Sort, SortKey, SortOrder,
};
pub use ledger::{LedgerService, TransferReceipt, TransferRecord, MAX_INTEREST_BPS};
