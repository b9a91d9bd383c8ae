//! Audit entry data structures
//!
//! Each entry records one ledger operation, who asked for it, what it
//! touched, and whether it was applied or rejected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::{AccountId, Money, TransferId};

/// Types of operations that can be audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    RegisterUser,
    OpenAccount,
    Deposit,
    Withdraw,
    Transfer,
    Interest,
    Deactivate,
    Reactivate,
    Rename,
    SetOverdraft,
    Restore,
    Prune,
    Batch,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::RegisterUser => "REGISTER_USER",
            Operation::OpenAccount => "OPEN_ACCOUNT",
            Operation::Deposit => "DEPOSIT",
            Operation::Withdraw => "WITHDRAW",
            Operation::Transfer => "TRANSFER",
            Operation::Interest => "INTEREST",
            Operation::Deactivate => "DEACTIVATE",
            Operation::Reactivate => "REACTIVATE",
            Operation::Rename => "RENAME",
            Operation::SetOverdraft => "SET_OVERDRAFT",
            Operation::Restore => "RESTORE",
            Operation::Prune => "PRUNE",
            Operation::Batch => "BATCH",
        };
        write!(f, "{}", name)
    }
}

/// Whether the operation took effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Applied,
    Rejected,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Applied => write!(f, "applied"),
            Outcome::Rejected => write!(f, "rejected"),
        }
    }
}

/// A single audit log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the operation occurred (UTC)
    pub timestamp: DateTime<Utc>,

    /// Acting user; empty for store-level operations
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,

    pub operation: Operation,

    pub outcome: Outcome,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountId>,

    /// Destination of a transfer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<AccountId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Money>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_id: Option<TransferId>,

    /// Rejection reason or free-form note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuditEntry {
    fn new(user: &str, operation: Operation, outcome: Outcome) -> Self {
        Self {
            timestamp: Utc::now(),
            user: user.to_string(),
            operation,
            outcome,
            account: None,
            counterparty: None,
            amount: None,
            transfer_id: None,
            detail: None,
        }
    }

    /// Entry for an operation that took effect
    pub fn applied(user: &str, operation: Operation) -> Self {
        Self::new(user, operation, Outcome::Applied)
    }

    /// Entry for an operation refused by validation
    pub fn rejected(user: &str, operation: Operation, error: &EngineError) -> Self {
        Self::new(user, operation, Outcome::Rejected).with_detail(error.to_string())
    }

    pub fn with_account(mut self, account: AccountId) -> Self {
        self.account = Some(account);
        self
    }

    pub fn with_counterparty(mut self, counterparty: AccountId) -> Self {
        self.counterparty = Some(counterparty);
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_transfer(mut self, transfer_id: TransferId) -> Self {
        self.transfer_id = Some(transfer_id);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Format the entry for human-readable output
    pub fn format_human_readable(&self) -> String {
        let mut output = format!(
            "[{}] {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.operation,
            self.outcome
        );

        if !self.user.is_empty() {
            output.push_str(&format!(" user={}", self.user));
        }
        if let Some(account) = self.account {
            output.push_str(&format!(" account={}", account));
        }
        if let Some(counterparty) = self.counterparty {
            output.push_str(&format!(" to={}", counterparty));
        }
        if let Some(amount) = self.amount {
            output.push_str(&format!(" amount={}", amount));
        }
        if let Some(transfer_id) = self.transfer_id {
            output.push_str(&format!(" transfer={}", transfer_id));
        }
        if let Some(detail) = &self.detail {
            output.push_str(&format!("\n  {}", detail));
        }

        output
    }
}
