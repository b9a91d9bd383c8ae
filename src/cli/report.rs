//! Report CLI commands

use chrono::NaiveDate;
use clap::Args;

use crate::error::TallyResult;
use crate::models::AccountRef;
use crate::reports::AccountStatement;
use crate::storage::Storage;

#[derive(Args, Debug, Clone)]
pub struct StatementArgs {
    /// Account id, nickname, or type
    pub account: String,
    /// First day of the period (default: 30 days before --to)
    #[arg(long)]
    pub from: Option<NaiveDate>,
    /// Last day of the period (default: today)
    #[arg(long)]
    pub to: Option<NaiveDate>,
}

/// Handle a statement command
pub fn handle_statement_command(
    storage: &Storage,
    username: &str,
    args: StatementArgs,
) -> TallyResult<()> {
    let statement = AccountStatement::generate(
        storage,
        username,
        &AccountRef::parse(&args.account),
        args.from,
        args.to,
    )?;

    print!(
        "{}",
        statement.format_text(&storage.settings().currency_symbol)
    );
    Ok(())
}
