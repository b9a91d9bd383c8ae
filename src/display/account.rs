//! Account display formatting
//!
//! Formats accounts for terminal output in table and detail views.

use crate::models::{Account, Money};

/// Format a list of accounts with balances as a table
pub fn format_account_list(accounts: &[Account], currency_symbol: &str) -> String {
    if accounts.is_empty() {
        return "No accounts found.".to_string();
    }

    let name_width = accounts
        .iter()
        .map(|a| a.display_name().chars().count())
        .max()
        .unwrap_or(4)
        .max(4);

    let mut output = String::new();
    output.push_str(&format!(
        "{:<12}  {:<name_width$}  {:>14}  {:>14}  {}\n",
        "ID",
        "Name",
        "Balance",
        "Available",
        "Status",
        name_width = name_width,
    ));
    output.push_str(&separator(name_width));

    for account in accounts {
        let status = if account.is_active() { "" } else { "Inactive" };

        output.push_str(&format!(
            "{:<12}  {:<name_width$}  {:>14}  {:>14}  {}\n",
            account.id.to_string(),
            account.display_name(),
            account.balance().format_with_symbol(currency_symbol),
            account.available().format_with_symbol(currency_symbol),
            status,
            name_width = name_width,
        ));
    }

    let total: Money = accounts.iter().map(|a| a.balance()).sum();
    output.push_str(&separator(name_width));
    output.push_str(&format!(
        "{:<12}  {:<name_width$}  {:>14}\n",
        "TOTAL",
        "",
        total.format_with_symbol(currency_symbol),
        name_width = name_width,
    ));

    output
}

fn separator(name_width: usize) -> String {
    format!(
        "{:-<12}  {:-<name_width$}  {:->14}  {:->14}  {:-<8}\n",
        "",
        "",
        "",
        "",
        "",
        name_width = name_width,
    )
}

/// Format a single account's details
pub fn format_account_details(account: &Account, currency_symbol: &str) -> String {
    let mut output = String::new();

    output.push_str(&format!("Account: {}\n", account.display_name()));
    output.push_str(&format!("  Type:            {}\n", account.kind));
    output.push_str(&format!("  ID:              {}\n", account.id.as_uuid()));
    output.push_str(&format!(
        "  Status:          {}\n",
        if account.is_active() { "Active" } else { "Inactive" }
    ));
    output.push('\n');
    output.push_str(&format!(
        "  Balance:         {}\n",
        account.balance().format_with_symbol(currency_symbol)
    ));
    if account.kind.allows_overdraft() {
        output.push_str(&format!(
            "  Overdraft Limit: {}\n",
            account.overdraft_limit().format_with_symbol(currency_symbol)
        ));
    }
    output.push_str(&format!(
        "  Available:       {}\n",
        account.available().format_with_symbol(currency_symbol)
    ));
    output.push_str(&format!(
        "  Transactions:    {}\n",
        account.transactions().len()
    ));

    output.push('\n');
    output.push_str(&format!(
        "  Opened:        {}\n",
        account.created_at.format("%Y-%m-%d %H:%M UTC")
    ));
    output.push_str(&format!(
        "  Last Activity: {}\n",
        account.last_activity.format("%Y-%m-%d %H:%M UTC")
    ));

    output
}
