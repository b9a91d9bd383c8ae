//! Transaction model
//!
//! An immutable record of one balance-affecting event. Amounts are stored as
//! positive magnitudes; the direction comes from the [`TransactionKind`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{AccountId, TransactionId, TransferId};
use super::money::Money;

/// What kind of event a transaction records
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    TransferOut,
    TransferIn,
    Interest,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 5] = [
        Self::Deposit,
        Self::Withdrawal,
        Self::TransferOut,
        Self::TransferIn,
        Self::Interest,
    ];

    /// Whether this kind increases the account balance
    pub fn is_inflow(&self) -> bool {
        matches!(self, Self::Deposit | Self::TransferIn | Self::Interest)
    }

    pub fn is_transfer(&self) -> bool {
        matches!(self, Self::TransferOut | Self::TransferIn)
    }

    /// Parse a kind from user input
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "deposit" => Some(Self::Deposit),
            "withdrawal" | "withdraw" => Some(Self::Withdrawal),
            "transfer_out" | "out" => Some(Self::TransferOut),
            "transfer_in" | "in" => Some(Self::TransferIn),
            "interest" => Some(Self::Interest),
            _ => None,
        }
    }

    /// Stable lowercase name, as used in the store and exports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::TransferOut => "transfer_out",
            Self::TransferIn => "transfer_in",
            Self::Interest => "interest",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deposit => write!(f, "Deposit"),
            Self::Withdrawal => write!(f, "Withdrawal"),
            Self::TransferOut => write!(f, "Transfer Out"),
            Self::TransferIn => write!(f, "Transfer In"),
            Self::Interest => write!(f, "Interest"),
        }
    }
}

/// A single immutable ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier
    pub id: TransactionId,

    /// Positive magnitude of the event
    pub amount: Money,

    pub kind: TransactionKind,

    /// When the transaction was recorded
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,

    /// Correlation id shared by both legs of a transfer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_id: Option<TransferId>,

    /// The other account of a transfer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<AccountId>,

    /// Balance of the owning account right after this entry was applied
    pub balance_after: Money,
}

impl Transaction {
    /// Signed effect of this transaction on the owning account's balance
    pub fn signed_amount(&self) -> Money {
        if self.kind.is_inflow() {
            self.amount
        } else {
            -self.amount
        }
    }

    pub fn is_transfer(&self) -> bool {
        self.kind.is_transfer()
    }

    /// Balance of the owning account right before this entry was applied
    pub fn balance_before(&self) -> Money {
        self.balance_after - self.signed_amount()
    }
}

/// Everything about a new entry except the parts the account fills in
/// (id, timestamp, resulting balance)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDraft {
    pub kind: TransactionKind,
    pub memo: Option<String>,
    pub transfer_id: Option<TransferId>,
    pub counterparty: Option<AccountId>,
}

impl EntryDraft {
    pub fn new(kind: TransactionKind) -> Self {
        Self {
            kind,
            memo: None,
            transfer_id: None,
            counterparty: None,
        }
    }

    pub fn with_memo(mut self, memo: Option<String>) -> Self {
        self.memo = memo.filter(|m| !m.trim().is_empty());
        self
    }

    pub fn with_transfer(mut self, transfer_id: TransferId, counterparty: AccountId) -> Self {
        self.transfer_id = Some(transfer_id);
        self.counterparty = Some(counterparty);
        self
    }

    pub(crate) fn into_transaction(
        self,
        amount: Money,
        balance_after: Money,
        created_at: DateTime<Utc>,
    ) -> Transaction {
        Transaction {
            id: TransactionId::new(),
            amount,
            kind: self.kind,
            created_at,
            memo: self.memo,
            transfer_id: self.transfer_id,
            counterparty: self.counterparty,
            balance_after,
        }
    }
}
