//! History CLI commands: paged history and summaries

use chrono::NaiveDate;
use clap::{Args, ValueEnum};

use crate::display::{format_history_page, format_summary};
use crate::error::TallyResult;
use crate::models::{AccountRef, Money, TransactionKind};
use crate::services::{HistoryFilter, HistoryService, Sort, SortKey, SortOrder};
use crate::storage::Storage;

use super::{parse_money, parse_transaction_kind};

/// Filters shared by history, summary and export
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only this account (id, nickname, or type)
    #[arg(short, long)]
    pub account: Option<String>,
    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,
    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,
    /// Transaction type to include; repeat for several
    #[arg(short, long = "kind", value_parser = parse_transaction_kind)]
    pub kinds: Vec<TransactionKind>,
    /// Smallest amount to include
    #[arg(long, value_parser = parse_money)]
    pub min: Option<Money>,
    /// Largest amount to include
    #[arg(long, value_parser = parse_money)]
    pub max: Option<Money>,
}

impl FilterArgs {
    pub fn account_ref(&self) -> Option<AccountRef> {
        self.account.as_deref().map(AccountRef::parse)
    }

    pub fn to_filter(&self) -> HistoryFilter {
        HistoryFilter::new()
            .date_range(self.from, self.to)
            .kinds(self.kinds.iter().copied())
            .amount_range(self.min, self.max)
    }
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum SortArg {
    #[default]
    Date,
    Amount,
    Kind,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OrderArg {
    Asc,
    #[default]
    Desc,
}

#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Sort field
    #[arg(long, value_enum, default_value_t)]
    pub sort: SortArg,
    /// Sort direction
    #[arg(long, value_enum, default_value_t)]
    pub order: OrderArg,
    /// Page number, starting at 1
    #[arg(short, long, default_value = "1")]
    pub page: usize,
    /// Entries per page (defaults to the configured page size)
    #[arg(long)]
    pub page_size: Option<usize>,
}

impl HistoryArgs {
    pub fn sort(&self) -> Sort {
        let key = match self.sort {
            SortArg::Date => SortKey::Date,
            SortArg::Amount => SortKey::Amount,
            SortArg::Kind => SortKey::Kind,
        };
        let order = match self.order {
            OrderArg::Asc => SortOrder::Ascending,
            OrderArg::Desc => SortOrder::Descending,
        };
        Sort::new(key, order)
    }
}

/// Handle a history command
pub fn handle_history_command(
    storage: &Storage,
    username: &str,
    args: HistoryArgs,
) -> TallyResult<()> {
    let page_size = args
        .page_size
        .unwrap_or(storage.settings().default_page_size);
    let account = args.filter.account_ref();

    let page = HistoryService::new(storage).query_history(
        username,
        account.as_ref(),
        &args.filter.to_filter(),
        args.sort(),
        args.page,
        page_size,
    )?;

    print!(
        "{}",
        format_history_page(&page, &storage.settings().currency_symbol)
    );
    if page.has_next() {
        println!("Next page: --page {}", page.page + 1);
    }
    Ok(())
}

/// Handle a summary command
pub fn handle_summary_command(
    storage: &Storage,
    username: &str,
    args: FilterArgs,
) -> TallyResult<()> {
    let account = args.account_ref();
    let summary =
        HistoryService::new(storage).summary(username, account.as_ref(), &args.to_filter())?;

    print!(
        "{}",
        format_summary(&summary, &storage.settings().currency_symbol)
    );
    Ok(())
}
