//! Money movement CLI commands: deposit, withdraw, transfer, and transfer
//! lookup

use clap::Args;

use crate::display::{format_transfer_details, format_transfer_list, format_transfer_receipt};
use crate::error::{PersistenceError, TallyResult};
use crate::models::{AccountRef, Money};
use crate::services::LedgerService;
use crate::storage::Storage;

use super::parse_money;

/// Arguments shared by deposit and withdraw
#[derive(Args)]
pub struct AmountArgs {
    /// Account id, nickname, or type
    pub account: String,
    /// Amount (e.g., "25.00")
    #[arg(value_parser = parse_money, allow_hyphen_values = true)]
    pub amount: Money,
    /// Optional memo
    #[arg(short, long)]
    pub memo: Option<String>,
}

#[derive(Args)]
pub struct TransferArgs {
    /// Source account id, nickname, or type
    pub from: String,
    /// Destination account id, nickname, or type
    pub to: String,
    /// Amount (e.g., "25.00")
    #[arg(value_parser = parse_money, allow_hyphen_values = true)]
    pub amount: Money,
    /// Optional memo, recorded on both legs
    #[arg(short, long)]
    pub memo: Option<String>,
}

#[derive(Args)]
pub struct TransfersArgs {
    /// Show one transfer by id (full or short `txf-` form)
    pub id: Option<String>,
    /// Only transfers into or out of this account
    #[arg(short, long, conflicts_with = "id")]
    pub account: Option<String>,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Handle a deposit command
pub fn handle_deposit_command(storage: &Storage, username: &str, args: AmountArgs) -> TallyResult<()> {
    let balance = LedgerService::new(storage).deposit(
        username,
        &AccountRef::parse(&args.account),
        args.amount,
        args.memo,
    )?;

    let symbol = storage.settings().currency_symbol.as_str();
    println!(
        "Deposited {} into {}. New balance: {}",
        args.amount.format_with_symbol(symbol),
        args.account,
        balance.format_with_symbol(symbol)
    );
    Ok(())
}

/// Handle a withdraw command
pub fn handle_withdraw_command(storage: &Storage, username: &str, args: AmountArgs) -> TallyResult<()> {
    let balance = LedgerService::new(storage).withdraw(
        username,
        &AccountRef::parse(&args.account),
        args.amount,
        args.memo,
    )?;

    let symbol = storage.settings().currency_symbol.as_str();
    println!(
        "Withdrew {} from {}. New balance: {}",
        args.amount.format_with_symbol(symbol),
        args.account,
        balance.format_with_symbol(symbol)
    );
    Ok(())
}

/// Handle a transfer command
pub fn handle_transfer_command(
    storage: &Storage,
    username: &str,
    args: TransferArgs,
) -> TallyResult<()> {
    let receipt = LedgerService::new(storage).transfer(
        username,
        &AccountRef::parse(&args.from),
        &AccountRef::parse(&args.to),
        args.amount,
        args.memo,
    )?;

    print!(
        "{}",
        format_transfer_receipt(&receipt, &storage.settings().currency_symbol)
    );
    Ok(())
}

/// Handle a transfers command: list transfers, or show one with both legs
pub fn handle_transfers_command(
    storage: &Storage,
    username: &str,
    args: TransfersArgs,
) -> TallyResult<()> {
    let service = LedgerService::new(storage);
    let symbol = storage.settings().currency_symbol.as_str();

    match args.id {
        Some(id) => {
            let record = service.transfer_by_id(username, &id)?;
            if args.json {
                println!("{}", to_json(&record)?);
            } else {
                print!("{}", format_transfer_details(&record, symbol));
            }
        }
        None => {
            let account = args.account.as_deref().map(AccountRef::parse);
            let records = service.transfers(username, account.as_ref())?;
            if args.json {
                println!("{}", to_json(&records)?);
            } else {
                print!("{}", format_transfer_list(&records, symbol));
            }
        }
    }

    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> TallyResult<String> {
    Ok(serde_json::to_string_pretty(value).map_err(PersistenceError::from)?)
}
