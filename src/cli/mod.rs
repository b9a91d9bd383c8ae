//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the service layer.

pub mod account;
pub mod backup;
pub mod batch;
pub mod config;
pub mod export;
pub mod history;
pub mod report;
pub mod session;
pub mod transaction;
pub mod user;

pub use account::{handle_account_command, AccountCommands};
pub use backup::{handle_backup_command, BackupCommands};
pub use batch::{handle_batch_command, handle_batch_template, BatchCommands, FormatArg};
pub use config::{handle_config_command, ConfigCommands};
pub use export::{handle_export_command, ExportArgs};
pub use history::{handle_history_command, handle_summary_command, FilterArgs, HistoryArgs};
pub use report::{handle_statement_command, StatementArgs};
pub use session::{read_new_password, Credentials};
pub use transaction::{
    handle_deposit_command, handle_transfer_command, handle_transfers_command,
    handle_withdraw_command, AmountArgs, TransferArgs, TransfersArgs,
};
pub use user::{handle_user_command, UserCommands};

use crate::models::{AccountKind, Money, TransactionKind};

/// Parse an amount argument such as `25`, `25.5` or `25.50`
pub fn parse_money(s: &str) -> Result<Money, String> {
    Money::parse(s).map_err(|e| format!("invalid amount '{}': {}", s, e))
}

/// Parse an account type argument
pub fn parse_kind(s: &str) -> Result<AccountKind, String> {
    AccountKind::parse(s).ok_or_else(|| {
        format!(
            "invalid account type '{}'. Valid types: savings, current, salary",
            s
        )
    })
}

/// Parse a transaction type argument
pub fn parse_transaction_kind(s: &str) -> Result<TransactionKind, String> {
    TransactionKind::parse(s).ok_or_else(|| {
        format!(
            "invalid transaction type '{}'. Valid types: deposit, withdrawal, transfer_out, transfer_in, interest",
            s
        )
    })
}
