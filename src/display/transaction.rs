//! Transaction display formatting
//!
//! History pages render as tables; receipts and summaries as plain text.

use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Modify, Style};
use tabled::{Table, Tabled};

use crate::models::{Money, TransactionKind};
use crate::services::{HistoryEntry, HistoryPage, HistorySummary, TransferReceipt, TransferRecord};

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Balance")]
    balance: String,
    #[tabled(rename = "Memo")]
    memo: String,
}

impl HistoryRow {
    fn new(entry: &HistoryEntry, currency_symbol: &str) -> Self {
        let txn = &entry.transaction;
        let transfer_indicator = if txn.is_transfer() { "⇄ " } else { "" };
        Self {
            date: txn.created_at.format("%Y-%m-%d %H:%M").to_string(),
            account: entry.account_name.clone(),
            kind: format!("{}{}", transfer_indicator, txn.kind),
            amount: txn.signed_amount().format_with_symbol(currency_symbol),
            balance: txn.balance_after.format_with_symbol(currency_symbol),
            memo: truncate(txn.memo.as_deref().unwrap_or(""), 30),
        }
    }
}

/// Format one history page as a table with a page footer
pub fn format_history_page(page: &HistoryPage, currency_symbol: &str) -> String {
    if page.total_items == 0 {
        return "No transactions found.\n".to_string();
    }

    let mut output = String::new();

    if page.items.is_empty() {
        output.push_str("No transactions on this page.\n");
    } else {
        let rows: Vec<HistoryRow> = page
            .items
            .iter()
            .map(|e| HistoryRow::new(e, currency_symbol))
            .collect();
        let mut table = Table::new(rows);
        table
            .with(Style::rounded())
            .with(Modify::new(Columns::new(3..5)).with(Alignment::right()));
        output.push_str(&table.to_string());
        output.push('\n');
    }

    output.push_str(&format!(
        "Page {} of {} ({} transactions)\n",
        page.page,
        page.total_pages.max(1),
        page.total_items
    ));

    output
}

/// Format a history summary
pub fn format_summary(summary: &HistorySummary, currency_symbol: &str) -> String {
    if summary.count == 0 {
        return "No transactions found.\n".to_string();
    }

    let fmt = |m: Money| m.format_with_symbol(currency_symbol);
    let mut output = String::new();

    output.push_str(&format!("Transactions: {}\n", summary.count));
    if let (Some(first), Some(last)) = (summary.first, summary.last) {
        output.push_str(&format!(
            "Period:       {} to {}\n",
            first.format("%Y-%m-%d"),
            last.format("%Y-%m-%d")
        ));
    }
    output.push('\n');

    output.push_str(&format!("{:<14} {:>6} {:>14}\n", "Type", "Count", "Total"));
    output.push_str(&"-".repeat(36));
    output.push('\n');
    for kind in TransactionKind::ALL {
        if let Some(total) = summary.by_kind.get(&kind) {
            output.push_str(&format!(
                "{:<14} {:>6} {:>14}\n",
                kind.to_string(),
                total.count,
                fmt(total.total)
            ));
        }
    }
    output.push('\n');

    output.push_str(&format!("Money In:   {}\n", fmt(summary.total_in)));
    output.push_str(&format!("Money Out:  {}\n", fmt(summary.total_out)));
    output.push_str(&format!("Net Change: {}\n", fmt(summary.net_change)));
    if let (Some(min), Some(max)) = (summary.min_amount, summary.max_amount) {
        output.push_str(&format!("Smallest:   {}\n", fmt(min)));
        output.push_str(&format!("Largest:    {}\n", fmt(max)));
    }

    output
}

/// Format a transfer confirmation
pub fn format_transfer_receipt(receipt: &TransferReceipt, currency_symbol: &str) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Transferred {} ({})\n",
        receipt.amount.format_with_symbol(currency_symbol),
        receipt.transfer_id
    ));
    output.push_str(&format!(
        "  From: {}  new balance {}\n",
        receipt.source,
        receipt.source_balance.format_with_symbol(currency_symbol)
    ));
    output.push_str(&format!(
        "  To:   {}  new balance {}\n",
        receipt.destination,
        receipt.destination_balance.format_with_symbol(currency_symbol)
    ));
    if let Some(memo) = &receipt.memo {
        output.push_str(&format!("  Memo: {}\n", memo));
    }

    output
}

#[derive(Tabled)]
struct TransferRow {
    #[tabled(rename = "Transfer")]
    id: String,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "From")]
    from: String,
    #[tabled(rename = "To")]
    to: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Memo")]
    memo: String,
}

/// Format a list of transfers as a table
pub fn format_transfer_list(records: &[TransferRecord], currency_symbol: &str) -> String {
    if records.is_empty() {
        return "No transfers found.\n".to_string();
    }

    let rows: Vec<TransferRow> = records
        .iter()
        .map(|r| TransferRow {
            id: r.transfer_id.to_string(),
            date: r.created_at.format("%Y-%m-%d %H:%M").to_string(),
            from: r.source_name.clone(),
            to: r.destination_name.clone(),
            amount: r.amount.format_with_symbol(currency_symbol),
            memo: truncate(r.memo.as_deref().unwrap_or(""), 30),
        })
        .collect();

    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..5)).with(Alignment::right()));
    format!("{}\n{} transfer(s)\n", table, records.len())
}

/// Format one transfer with both of its legs
pub fn format_transfer_details(record: &TransferRecord, currency_symbol: &str) -> String {
    let fmt = |m: Money| m.format_with_symbol(currency_symbol);
    let mut output = String::new();

    output.push_str(&format!("Transfer:  {}\n", record.transfer_id));
    output.push_str(&format!(
        "Date:      {}\n",
        record.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str(&format!("Amount:    {}\n", fmt(record.amount)));
    if let Some(memo) = &record.memo {
        output.push_str(&format!("Memo:      {}\n", memo));
    }
    output.push('\n');
    output.push_str(&format!(
        "  Out: {} ({})  {} -> {}  [{}]\n",
        record.source_name,
        record.source,
        fmt(record.out_leg.balance_before()),
        fmt(record.out_leg.balance_after),
        record.out_leg.id
    ));
    output.push_str(&format!(
        "  In:  {} ({})  {} -> {}  [{}]\n",
        record.destination_name,
        record.destination,
        fmt(record.in_leg.balance_before()),
        fmt(record.in_leg.balance_after),
        record.in_leg.id
    ));

    output
}

/// Truncate a string to a maximum character count
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
