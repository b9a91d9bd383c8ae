//! Account CLI commands
//!
//! Implements CLI commands for account management.

use clap::Subcommand;

use crate::display::account::{format_account_details, format_account_list};
use crate::error::TallyResult;
use crate::models::{AccountKind, AccountRef, Money};
use crate::services::{AccountService, LedgerService};
use crate::storage::Storage;

use super::{parse_kind, parse_money};

/// Account subcommands
#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account
    Open {
        /// Account type (savings, current, salary)
        #[arg(value_parser = parse_kind)]
        kind: AccountKind,
        /// Optional nickname, unique among your accounts
        #[arg(short, long)]
        nickname: Option<String>,
        /// Opening balance (e.g., "1000.00" or "1000")
        #[arg(short, long, default_value = "0", value_parser = parse_money)]
        balance: Money,
        /// Overdraft limit (current accounts only)
        #[arg(short, long, default_value = "0", value_parser = parse_money)]
        overdraft: Money,
    },
    /// List accounts
    List {
        /// Include inactive accounts
        #[arg(short, long)]
        all: bool,
    },
    /// Show account details
    Show {
        /// Account id, nickname, or type
        account: String,
    },
    /// Set or clear an account nickname
    Rename {
        /// Account id, nickname, or type
        account: String,
        /// New nickname; omit to clear
        nickname: Option<String>,
    },
    /// Change the overdraft limit of a current account
    Overdraft {
        /// Account id, nickname, or type
        account: String,
        /// New limit
        #[arg(value_parser = parse_money)]
        limit: Money,
    },
    /// Deactivate an account
    Deactivate {
        /// Account id, nickname, or type
        account: String,
    },
    /// Reactivate an account
    Reactivate {
        /// Account id, nickname, or type
        account: String,
    },
    /// Post one-off interest to a savings or salary account
    Interest {
        /// Account id, nickname, or type
        account: String,
        /// Rate in basis points (250 = 2.50%)
        bps: u32,
    },
}

impl AccountCommands {
    /// Whether the command changes the ledger
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::List { .. } | Self::Show { .. })
    }
}

/// Handle an account command
pub fn handle_account_command(
    storage: &Storage,
    username: &str,
    cmd: AccountCommands,
) -> TallyResult<()> {
    let service = AccountService::new(storage);
    let symbol = storage.settings().currency_symbol.as_str();

    match cmd {
        AccountCommands::Open {
            kind,
            nickname,
            balance,
            overdraft,
        } => {
            let account = service.open_account(username, kind, nickname, balance, overdraft)?;

            println!("Opened account: {}", account.display_name());
            println!("  Balance: {}", account.balance().format_with_symbol(symbol));
            if account.kind.allows_overdraft() {
                println!(
                    "  Overdraft Limit: {}",
                    account.overdraft_limit().format_with_symbol(symbol)
                );
            }
            println!("  ID: {}", account.id);
        }

        AccountCommands::List { all } => {
            let accounts = service.list(username, all)?;
            print!("{}", format_account_list(&accounts, symbol));
            if accounts.is_empty() {
                println!();
            }
        }

        AccountCommands::Show { account } => {
            let found = service.find(username, &AccountRef::parse(&account))?;
            print!("{}", format_account_details(&found, symbol));
        }

        AccountCommands::Rename { account, nickname } => {
            let updated = service.set_nickname(username, &AccountRef::parse(&account), nickname)?;
            match &updated.nickname {
                Some(nickname) => println!("Renamed {} to '{}'", updated.id, nickname),
                None => println!("Cleared nickname of {}", updated.id),
            }
        }

        AccountCommands::Overdraft { account, limit } => {
            let updated =
                service.set_overdraft_limit(username, &AccountRef::parse(&account), limit)?;
            println!(
                "Overdraft limit for {} is now {}",
                updated.display_name(),
                updated.overdraft_limit().format_with_symbol(symbol)
            );
        }

        AccountCommands::Deactivate { account } => {
            let updated = service.deactivate(username, &AccountRef::parse(&account))?;
            println!("Deactivated account: {}", updated.display_name());
        }

        AccountCommands::Reactivate { account } => {
            let updated = service.reactivate(username, &AccountRef::parse(&account))?;
            println!("Reactivated account: {}", updated.display_name());
        }

        AccountCommands::Interest { account, bps } => {
            let ledger = LedgerService::new(storage);
            match ledger.apply_interest(username, &AccountRef::parse(&account), bps)? {
                Some(txn) => println!(
                    "Posted interest of {} (new balance {})",
                    txn.amount.format_with_symbol(symbol),
                    txn.balance_after.format_with_symbol(symbol)
                ),
                None => println!("No interest to post."),
            }
        }
    }

    Ok(())
}
