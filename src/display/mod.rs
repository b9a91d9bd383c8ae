//! Display formatting for terminal output
//!
//! Formats accounts, history pages, summaries, transfers, receipts and batch
//! reports for the CLI.

pub mod account;
pub mod batch;
pub mod transaction;

pub use account::{format_account_details, format_account_list};
pub use batch::format_batch_report;
pub use transaction::{
    format_history_page, format_summary, format_transfer_details, format_transfer_list,
    format_transfer_receipt,
};
