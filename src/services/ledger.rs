//! Ledger service
//!
//! The mutation engine: deposits, withdrawals, transfers and interest
//! postings. Each operation holds the ledger write lock from validation
//! through application, so a rejected operation touches nothing and an
//! accepted one is applied in full.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::audit::{AuditEntry, Operation};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Account, AccountId, AccountRef, EntryDraft, Ledger, Money, Transaction, TransactionKind,
    TransferId, User,
};
use crate::storage::Storage;

/// Upper bound for a one-off interest rate, in basis points (100%)
pub const MAX_INTEREST_BPS: u32 = 10_000;

/// Service for balance-changing operations
pub struct LedgerService<'a> {
    storage: &'a Storage,
}

/// Result of a committed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    /// Correlation id shared by both legs
    pub transfer_id: TransferId,
    pub amount: Money,
    pub source: AccountId,
    pub destination: AccountId,
    /// Source balance after the transfer
    pub source_balance: Money,
    /// Destination balance after the transfer
    pub destination_balance: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A committed transfer read back from the ledger, with both legs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRecord {
    pub transfer_id: TransferId,
    pub amount: Money,
    pub source: AccountId,
    pub source_name: String,
    pub destination: AccountId,
    pub destination_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub out_leg: Transaction,
    pub in_leg: Transaction,
}

impl<'a> LedgerService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// A user's transfers, newest first, optionally only those touching
    /// one account
    pub fn transfers(
        &self,
        username: &str,
        account: Option<&AccountRef>,
    ) -> EngineResult<Vec<TransferRecord>> {
        let ledger = self.storage.read()?;
        let user = ledger.user(username)?;
        let account_id = account.map(|a| user.account(a).map(|a| a.id)).transpose()?;

        let mut records = collect_transfers(user);
        if let Some(id) = account_id {
            records.retain(|r| r.source == id || r.destination == id);
        }
        Ok(records)
    }

    /// Look up one transfer by full id or short `txf-` form
    pub fn transfer_by_id(&self, username: &str, transfer_id: &str) -> EngineResult<TransferRecord> {
        let ledger = self.storage.read()?;
        collect_transfers(ledger.user(username)?)
            .into_iter()
            .find(|r| r.transfer_id.matches(transfer_id))
            .ok_or_else(|| EngineError::TransferNotFound(transfer_id.trim().to_string()))
    }

    /// Credit an account; returns the new balance
    pub fn deposit(
        &self,
        username: &str,
        account: &AccountRef,
        amount: Money,
        memo: Option<String>,
    ) -> EngineResult<Money> {
        let result = self.storage.write().and_then(|mut ledger| {
            let draft = EntryDraft::new(TransactionKind::Deposit).with_memo(memo);
            post(&mut ledger, username, account, amount, draft)
        });

        self.record(username, Operation::Deposit, amount, &result);
        result.map(|(_, balance)| balance)
    }

    /// Debit an account; returns the new balance
    pub fn withdraw(
        &self,
        username: &str,
        account: &AccountRef,
        amount: Money,
        memo: Option<String>,
    ) -> EngineResult<Money> {
        let result = self.storage.write().and_then(|mut ledger| {
            let draft = EntryDraft::new(TransactionKind::Withdrawal).with_memo(memo);
            post(&mut ledger, username, account, amount, draft)
        });

        self.record(username, Operation::Withdraw, amount, &result);
        result.map(|(_, balance)| balance)
    }

    /// Move money between two of a user's accounts
    pub fn transfer(
        &self,
        username: &str,
        from: &AccountRef,
        to: &AccountRef,
        amount: Money,
        memo: Option<String>,
    ) -> EngineResult<TransferReceipt> {
        let result = self
            .storage
            .write()
            .and_then(|mut ledger| transfer(&mut ledger, username, from, to, amount, memo));

        let entry = match &result {
            Ok(receipt) => AuditEntry::applied(username, Operation::Transfer)
                .with_account(receipt.source)
                .with_counterparty(receipt.destination)
                .with_amount(receipt.amount)
                .with_transfer(receipt.transfer_id),
            Err(e) => AuditEntry::rejected(username, Operation::Transfer, e)
                .with_amount(amount)
                .with_detail(format!("{} -> {}: {}", from, to, e)),
        };
        self.storage.record(entry);

        result
    }

    /// Post one-off interest at `rate_bps` basis points of the current
    /// balance. Returns the posted transaction, or `None` when the interest
    /// rounds to nothing.
    pub fn apply_interest(
        &self,
        username: &str,
        account: &AccountRef,
        rate_bps: u32,
    ) -> EngineResult<Option<Transaction>> {
        let result = self
            .storage
            .write()
            .and_then(|mut ledger| apply_interest(&mut ledger, username, account, rate_bps));

        let entry = match &result {
            Ok(Some(txn)) => AuditEntry::applied(username, Operation::Interest)
                .with_amount(txn.amount)
                .with_detail(format!("{} bps", rate_bps)),
            Ok(None) => AuditEntry::applied(username, Operation::Interest)
                .with_detail(format!("{} bps, nothing to post", rate_bps)),
            Err(e) => AuditEntry::rejected(username, Operation::Interest, e),
        };
        self.storage.record(entry);

        result
    }

    fn record(
        &self,
        username: &str,
        operation: Operation,
        amount: Money,
        result: &EngineResult<(AccountId, Money)>,
    ) {
        let entry = match result {
            Ok((account, _)) => AuditEntry::applied(username, operation)
                .with_account(*account)
                .with_amount(amount),
            Err(e) => AuditEntry::rejected(username, operation, e).with_amount(amount),
        };
        self.storage.record(entry);
    }
}

/// Pair every outgoing leg with the incoming leg sharing its transfer id
fn collect_transfers(user: &User) -> Vec<TransferRecord> {
    let incoming: HashMap<TransferId, (&Account, &Transaction)> = user
        .accounts()
        .iter()
        .flat_map(|a| a.transactions().iter().map(move |t| (a, t)))
        .filter(|(_, t)| t.kind == TransactionKind::TransferIn)
        .filter_map(|(a, t)| t.transfer_id.map(|id| (id, (a, t))))
        .collect();

    let mut records = Vec::new();
    for account in user.accounts() {
        for out_leg in account.transactions() {
            if out_leg.kind != TransactionKind::TransferOut {
                continue;
            }
            let Some((id, (destination, in_leg))) = out_leg
                .transfer_id
                .and_then(|id| incoming.get(&id).map(|pair| (id, *pair)))
            else {
                continue;
            };

            records.push(TransferRecord {
                transfer_id: id,
                amount: out_leg.amount,
                source: account.id,
                source_name: account.display_name(),
                destination: destination.id,
                destination_name: destination.display_name(),
                memo: out_leg.memo.clone(),
                created_at: out_leg.created_at,
                out_leg: out_leg.clone(),
                in_leg: in_leg.clone(),
            });
        }
    }

    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records
}

/// Apply a single-account entry through the credit or debit primitive
pub(super) fn post(
    ledger: &mut Ledger,
    username: &str,
    account: &AccountRef,
    amount: Money,
    draft: EntryDraft,
) -> EngineResult<(AccountId, Money)> {
    let account = ledger.user_mut(username)?.account_mut(account)?;

    if draft.kind.is_inflow() {
        account.post_credit(amount, draft)?;
    } else {
        account.post_debit(amount, draft)?;
    }

    Ok((account.id, account.balance()))
}

pub(super) fn transfer(
    ledger: &mut Ledger,
    username: &str,
    from: &AccountRef,
    to: &AccountRef,
    amount: Money,
    memo: Option<String>,
) -> EngineResult<TransferReceipt> {
    let user = ledger.user_mut(username)?;
    let from_index = user.account_index(from)?;
    let to_index = user.account_index(to)?;

    if from_index == to_index {
        return Err(EngineError::SameAccountTransfer(
            user.accounts()[from_index].id,
        ));
    }
    if !amount.is_positive() {
        return Err(EngineError::InvalidAmount(format!(
            "transfer amount must be positive, got {}",
            amount
        )));
    }

    let (source, destination) = user.account_pair_mut(from_index, to_index);
    source.ensure_active()?;
    destination.ensure_active()?;
    source.check_debit(amount)?;
    destination.check_credit(amount)?;

    // Every check has passed under the write lock; neither leg can fail now
    let transfer_id = TransferId::new();
    let memo = memo.filter(|m| !m.trim().is_empty());

    let out_leg = EntryDraft::new(TransactionKind::TransferOut)
        .with_memo(memo.clone())
        .with_transfer(transfer_id, destination.id);
    let created_at = source.post_debit(amount, out_leg)?.created_at;

    let in_leg = EntryDraft::new(TransactionKind::TransferIn)
        .with_memo(memo.clone())
        .with_transfer(transfer_id, source.id);
    destination.post_credit(amount, in_leg)?;

    Ok(TransferReceipt {
        transfer_id,
        amount,
        source: source.id,
        destination: destination.id,
        source_balance: source.balance(),
        destination_balance: destination.balance(),
        memo,
        created_at,
    })
}

fn apply_interest(
    ledger: &mut Ledger,
    username: &str,
    account: &AccountRef,
    rate_bps: u32,
) -> EngineResult<Option<Transaction>> {
    if rate_bps > MAX_INTEREST_BPS {
        return Err(EngineError::Validation(format!(
            "interest rate {} bps exceeds the maximum of {} bps",
            rate_bps, MAX_INTEREST_BPS
        )));
    }

    let account = ledger.user_mut(username)?.account_mut(account)?;
    account.ensure_active()?;
    if !account.kind.earns_interest() {
        return Err(EngineError::Validation(format!(
            "{} accounts do not earn interest",
            account.kind
        )));
    }

    let interest = account
        .balance()
        .apply_basis_points(rate_bps)
        .ok_or_else(|| EngineError::InvalidAmount("interest overflows the balance".into()))?;
    if !interest.is_positive() {
        return Ok(None);
    }

    let draft = EntryDraft::new(TransactionKind::Interest).with_memo(Some(format!(
        "Interest at {}.{:02}%",
        rate_bps / 100,
        rate_bps % 100
    )));
    Ok(Some(account.post_credit(interest, draft)?.clone()))
}
