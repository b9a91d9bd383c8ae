//! Account statement
//!
//! Opening and closing balances for a period, per-kind totals, and every
//! transaction in the period with its running balance. Balances come from
//! the post-transaction balances recorded on each entry.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::error::{EngineError, EngineResult};
use crate::models::{Account, AccountId, AccountRef, Money, TransactionKind};
use crate::services::history::{summarize, HistorySummary};
use crate::storage::Storage;

/// Days covered when no start date is given
pub const DEFAULT_PERIOD_DAYS: i64 = 30;

/// One transaction line on a statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementLine {
    pub timestamp: DateTime<Utc>,
    pub kind: TransactionKind,
    pub memo: Option<String>,
    /// Signed effect on the balance
    pub amount: Money,
    pub running_balance: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountStatement {
    pub account_id: AccountId,
    pub account_name: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub opening_balance: Money,
    pub closing_balance: Money,
    pub lines: Vec<StatementLine>,
    pub summary: HistorySummary,
}

impl AccountStatement {
    /// Generate a statement for one of a user's accounts.
    ///
    /// `to` defaults to today and `from` to thirty days before `to`.
    pub fn generate(
        storage: &Storage,
        username: &str,
        account: &AccountRef,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> EngineResult<Self> {
        let ledger = storage.read()?;
        let account = ledger.user(username)?.account(account)?;
        Self::for_account(account, from, to)
    }

    /// Build a statement from an account snapshot
    pub fn for_account(
        account: &Account,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> EngineResult<Self> {
        let to = to.unwrap_or_else(|| Utc::now().date_naive());
        let from = from.unwrap_or(to - Duration::days(DEFAULT_PERIOD_DAYS));
        if from > to {
            return Err(EngineError::Validation(format!(
                "statement start {} is after its end {}",
                from, to
            )));
        }

        let transactions = account.transactions();

        // Balance carried in from before the period
        let opening_balance = transactions
            .iter()
            .take_while(|t| t.created_at.date_naive() < from)
            .last()
            .map(|t| t.balance_after)
            .unwrap_or_default();

        let in_period: Vec<_> = transactions
            .iter()
            .filter(|t| {
                let date = t.created_at.date_naive();
                date >= from && date <= to
            })
            .collect();

        let lines: Vec<StatementLine> = in_period
            .iter()
            .map(|t| StatementLine {
                timestamp: t.created_at,
                kind: t.kind,
                memo: t.memo.clone(),
                amount: t.signed_amount(),
                running_balance: t.balance_after,
            })
            .collect();

        let closing_balance = lines
            .last()
            .map(|l| l.running_balance)
            .unwrap_or(opening_balance);

        Ok(Self {
            account_id: account.id,
            account_name: account.display_name(),
            from,
            to,
            opening_balance,
            closing_balance,
            lines,
            summary: summarize(in_period)?,
        })
    }

    /// Format the statement for terminal display
    pub fn format_text(&self, currency_symbol: &str) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "Statement: {} [{}]\n",
            self.account_name, self.account_id
        ));
        output.push_str(&format!("Period: {} to {}\n", self.from, self.to));
        output.push_str(&"=".repeat(78));
        output.push('\n');
        output.push_str(&format!(
            "Opening Balance: {}\n\n",
            self.opening_balance.format_with_symbol(currency_symbol)
        ));

        output.push_str(&format!(
            "{:<17} {:<13} {:<20} {:>12} {:>12}\n",
            "Date", "Type", "Memo", "Amount", "Balance"
        ));
        output.push_str(&"-".repeat(78));
        output.push('\n');

        if self.lines.is_empty() {
            output.push_str("  (no transactions in this period)\n");
        }

        for line in &self.lines {
            let memo = line.memo.as_deref().unwrap_or("");
            let memo_display = if memo.chars().count() > 20 {
                format!("{}...", memo.chars().take(17).collect::<String>())
            } else {
                memo.to_string()
            };

            output.push_str(&format!(
                "{:<17} {:<13} {:<20} {:>12} {:>12}\n",
                line.timestamp.format("%Y-%m-%d %H:%M"),
                line.kind.to_string(),
                memo_display,
                line.amount.format_with_symbol(currency_symbol),
                line.running_balance.format_with_symbol(currency_symbol),
            ));
        }

        output.push_str(&"-".repeat(78));
        output.push('\n');

        for (kind, total) in &self.summary.by_kind {
            output.push_str(&format!(
                "{:<15} {:>4} x  {:>12}\n",
                kind.to_string(),
                total.count,
                total.total.format_with_symbol(currency_symbol)
            ));
        }

        output.push_str(&format!(
            "\nMoney In:  {}  |  Money Out: {}  |  Net: {}\n",
            self.summary.total_in.format_with_symbol(currency_symbol),
            self.summary.total_out.format_with_symbol(currency_symbol),
            self.summary.net_change.format_with_symbol(currency_symbol),
        ));
        output.push_str(&format!(
            "Closing Balance: {}\n",
            self.closing_balance.format_with_symbol(currency_symbol)
        ));

        output
    }
}
