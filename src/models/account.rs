//! Account model
//!
//! An account holds a balance and exclusively owns its transaction list.
//! [`Account::credit`] and [`Account::debit`] are the only operations that
//! move the balance; every higher-level operation goes through them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::AccountId;
use super::money::Money;
use super::transaction::{EntryDraft, Transaction, TransactionKind};
use crate::error::{EngineError, EngineResult};

/// Maximum nickname length in characters
pub const MAX_NICKNAME_LEN: usize = 50;

/// Type of account
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Savings,
    /// The only kind that may carry an overdraft limit
    Current,
    Salary,
}

impl AccountKind {
    pub const ALL: [AccountKind; 3] = [Self::Savings, Self::Current, Self::Salary];

    pub fn allows_overdraft(&self) -> bool {
        match self {
            Self::Current => true,
            Self::Savings | Self::Salary => false,
        }
    }

    pub fn earns_interest(&self) -> bool {
        match self {
            Self::Savings | Self::Salary => true,
            Self::Current => false,
        }
    }

    /// Parse account kind from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "savings" | "saving" => Some(Self::Savings),
            "current" | "checking" => Some(Self::Current),
            "salary" => Some(Self::Salary),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Savings => "savings",
            Self::Current => "current",
            Self::Salary => "salary",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Savings => write!(f, "Savings"),
            Self::Current => write!(f, "Current"),
            Self::Salary => write!(f, "Salary"),
        }
    }
}

/// A balance-holding account owned by exactly one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,

    pub kind: AccountKind,

    /// Optional user-assigned label, unique per user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,

    balance: Money,

    /// How far below zero the balance may go (always zero unless the kind
    /// allows overdraft)
    overdraft_limit: Money,

    /// Inactive accounts reject every mutation but stay readable
    active: bool,

    pub created_at: DateTime<Utc>,

    pub last_activity: DateTime<Utc>,

    transactions: Vec<Transaction>,
}

impl Account {
    /// Open a new account.
    ///
    /// A positive opening balance is recorded as a first deposit so the
    /// transaction history always explains the balance.
    pub fn open(
        kind: AccountKind,
        nickname: Option<String>,
        opening_balance: Money,
        overdraft_limit: Money,
    ) -> EngineResult<Self> {
        if opening_balance.is_negative() {
            return Err(EngineError::InvalidAmount(format!(
                "opening balance cannot be negative ({})",
                opening_balance
            )));
        }
        validate_overdraft(kind, overdraft_limit)?;
        let nickname = nickname.map(|n| validate_nickname(&n)).transpose()?;

        let now = Utc::now();
        let mut account = Self {
            id: AccountId::new(),
            kind,
            nickname,
            balance: Money::zero(),
            overdraft_limit,
            active: true,
            created_at: now,
            last_activity: now,
            transactions: Vec::new(),
        };

        if opening_balance.is_positive() {
            let draft = EntryDraft::new(TransactionKind::Deposit)
                .with_memo(Some("Opening balance".to_string()));
            account.post_credit(opening_balance, draft)?;
        }

        Ok(account)
    }

    pub fn balance(&self) -> Money {
        self.balance
    }

    pub fn overdraft_limit(&self) -> Money {
        self.overdraft_limit
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Funds that can be debited right now, overdraft included
    pub fn available(&self) -> Money {
        self.balance + self.overdraft_limit
    }

    /// Human-facing label: nickname with kind, or just the kind
    pub fn display_name(&self) -> String {
        match &self.nickname {
            Some(nickname) => format!("{} ({})", nickname, self.kind),
            None => self.kind.to_string(),
        }
    }

    /// Credit the account with a plain deposit
    pub fn credit(&mut self, amount: Money) -> EngineResult<Money> {
        self.post_credit(amount, EntryDraft::new(TransactionKind::Deposit))?;
        Ok(self.balance)
    }

    /// Debit the account with a plain withdrawal
    pub fn debit(&mut self, amount: Money) -> EngineResult<Money> {
        self.post_debit(amount, EntryDraft::new(TransactionKind::Withdrawal))?;
        Ok(self.balance)
    }

    /// Validate a credit without applying it; returns the resulting balance
    pub fn check_credit(&self, amount: Money) -> EngineResult<Money> {
        self.ensure_active()?;
        ensure_positive(amount)?;
        self.balance
            .checked_add(amount)
            .ok_or_else(|| EngineError::InvalidAmount(format!("{} overflows the balance", amount)))
    }

    /// Validate a debit without applying it; returns the resulting balance
    pub fn check_debit(&self, amount: Money) -> EngineResult<Money> {
        self.ensure_active()?;
        ensure_positive(amount)?;
        let new_balance = self.balance.checked_sub(amount).ok_or_else(|| {
            EngineError::InvalidAmount(format!("{} overflows the balance", amount))
        })?;

        if new_balance < -self.overdraft_limit {
            let available = self.available();
            return Err(EngineError::InsufficientFunds {
                account: self.id,
                available,
                requested: amount,
                shortfall: amount - available,
            });
        }

        Ok(new_balance)
    }

    /// Apply a credit carrying the given entry details
    pub(crate) fn post_credit(
        &mut self,
        amount: Money,
        draft: EntryDraft,
    ) -> EngineResult<&Transaction> {
        debug_assert!(draft.kind.is_inflow());
        let new_balance = self.check_credit(amount)?;
        Ok(self.append(amount, new_balance, draft))
    }

    /// Apply a debit carrying the given entry details
    pub(crate) fn post_debit(
        &mut self,
        amount: Money,
        draft: EntryDraft,
    ) -> EngineResult<&Transaction> {
        debug_assert!(!draft.kind.is_inflow());
        let new_balance = self.check_debit(amount)?;
        Ok(self.append(amount, new_balance, draft))
    }

    fn append(&mut self, amount: Money, new_balance: Money, draft: EntryDraft) -> &Transaction {
        let now = Utc::now();
        self.balance = new_balance;
        self.last_activity = now;
        self.transactions
            .push(draft.into_transaction(amount, new_balance, now));
        &self.transactions[self.transactions.len() - 1]
    }

    /// Fail with `AccountInactive` if the account is deactivated
    pub fn ensure_active(&self) -> EngineResult<()> {
        if self.active {
            Ok(())
        } else {
            Err(EngineError::AccountInactive { account: self.id })
        }
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.last_activity = Utc::now();
    }

    pub fn reactivate(&mut self) {
        self.active = true;
        self.last_activity = Utc::now();
    }

    /// Change or clear the nickname. Uniqueness is checked by the owning user.
    pub fn set_nickname(&mut self, nickname: Option<String>) -> EngineResult<()> {
        self.nickname = nickname.map(|n| validate_nickname(&n)).transpose()?;
        self.last_activity = Utc::now();
        Ok(())
    }

    /// Change the overdraft limit.
    ///
    /// The new limit must keep the current balance within bounds.
    pub fn set_overdraft_limit(&mut self, limit: Money) -> EngineResult<()> {
        validate_overdraft(self.kind, limit)?;
        if self.balance < -limit {
            return Err(EngineError::Validation(format!(
                "overdraft limit {} is below the current balance {}",
                limit, self.balance
            )));
        }
        self.overdraft_limit = limit;
        self.last_activity = Utc::now();
        Ok(())
    }

    /// Check the balance invariants hold
    pub fn invariants_hold(&self) -> bool {
        let limit_ok = self.overdraft_limit >= Money::zero()
            && (self.kind.allows_overdraft() || self.overdraft_limit.is_zero());
        limit_ok && self.balance >= -self.overdraft_limit
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

fn ensure_positive(amount: Money) -> EngineResult<()> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(EngineError::InvalidAmount(format!(
            "amount must be positive, got {}",
            amount
        )))
    }
}

fn validate_overdraft(kind: AccountKind, limit: Money) -> EngineResult<()> {
    if limit.is_negative() {
        return Err(EngineError::InvalidAmount(format!(
            "overdraft limit cannot be negative ({})",
            limit
        )));
    }
    if limit.is_positive() && !kind.allows_overdraft() {
        return Err(EngineError::Validation(format!(
            "{} accounts do not support overdraft",
            kind
        )));
    }
    Ok(())
}

fn validate_nickname(nickname: &str) -> EngineResult<String> {
    let nickname = nickname.trim();
    if nickname.is_empty() {
        return Err(EngineError::Validation("Nickname cannot be empty".into()));
    }
    if nickname.chars().count() > MAX_NICKNAME_LEN {
        return Err(EngineError::Validation(format!(
            "Nickname too long (max {} chars)",
            MAX_NICKNAME_LEN
        )));
    }
    if AccountKind::parse(nickname).is_some() {
        return Err(EngineError::Validation(format!(
            "Nickname '{}' collides with an account type name",
            nickname
        )));
    }
    if nickname.starts_with("acc-") {
        return Err(EngineError::Validation(
            "Nickname cannot start with 'acc-'".into(),
        ));
    }
    Ok(nickname.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn savings(cents: i64) -> Account {
        Account::open(AccountKind::Savings, None, Money::from_cents(cents), Money::zero()).unwrap()
    }

    fn current(cents: i64, overdraft: i64) -> Account {
        Account::open(
            AccountKind::Current,
            None,
            Money::from_cents(cents),
            Money::from_cents(overdraft),
        )
        .unwrap()
    }

    #[test]
    fn test_open_records_opening_deposit() {
        let account = savings(10000);
        assert_eq!(account.balance(), Money::from_cents(10000));
        assert_eq!(account.transactions().len(), 1);
        assert_eq!(account.transactions()[0].kind, TransactionKind::Deposit);

        let empty = savings(0);
        assert!(empty.transactions().is_empty());
    }

    #[test]
    fn test_open_rejects_bad_input() {
        assert!(matches!(
            Account::open(AccountKind::Savings, None, Money::from_cents(-1), Money::zero()),
            Err(EngineError::InvalidAmount(_))
        ));
        assert!(matches!(
            Account::open(AccountKind::Savings, None, Money::zero(), Money::from_cents(100)),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            Account::open(AccountKind::Salary, Some("current".into()), Money::zero(), Money::zero()),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_credit() {
        let mut account = savings(0);
        assert_eq!(account.credit(Money::from_cents(2500)).unwrap(), Money::from_cents(2500));
        assert_eq!(account.transactions().len(), 1);
        assert_eq!(account.transactions()[0].balance_after, Money::from_cents(2500));
    }

    #[test]
    fn test_credit_rejects_non_positive() {
        let mut account = savings(100);
        assert!(matches!(account.credit(Money::zero()), Err(EngineError::InvalidAmount(_))));
        assert!(matches!(
            account.credit(Money::from_cents(-5)),
            Err(EngineError::InvalidAmount(_))
        ));
        assert_eq!(account.transactions().len(), 1);
    }

    #[test]
    fn test_withdraw_beyond_balance_without_overdraft() {
        let mut account = savings(10000);
        let err = account.debit(Money::from_cents(15000)).unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientFunds {
                account: account.id,
                available: Money::from_cents(10000),
                requested: Money::from_cents(15000),
                shortfall: Money::from_cents(5000),
            }
        );
        assert_eq!(account.balance(), Money::from_cents(10000));
        assert_eq!(account.transactions().len(), 1);
    }

    #[test]
    fn test_withdraw_into_overdraft() {
        let mut account = current(5000, 20000);
        let balance = account.debit(Money::from_cents(15000)).unwrap();
        assert_eq!(balance, Money::from_cents(-10000));
        assert!(account.invariants_hold());

        let err = account.debit(Money::from_cents(10001)).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientFunds { shortfall, .. } if shortfall == Money::from_cents(1)
        ));
    }

    #[test]
    fn test_inactive_rejects_mutations() {
        let mut account = savings(1000);
        account.deactivate();
        assert!(matches!(
            account.credit(Money::from_cents(1)),
            Err(EngineError::AccountInactive { .. })
        ));
        assert!(matches!(
            account.debit(Money::from_cents(1)),
            Err(EngineError::AccountInactive { .. })
        ));
        assert_eq!(account.balance(), Money::from_cents(1000));

        account.reactivate();
        assert!(account.credit(Money::from_cents(1)).is_ok());
    }

    #[test]
    fn test_set_overdraft_limit() {
        let mut account = current(0, 10000);
        account.debit(Money::from_cents(8000)).unwrap();

        // Can't shrink the limit below the current negative balance
        assert!(account.set_overdraft_limit(Money::from_cents(5000)).is_err());
        account.set_overdraft_limit(Money::from_cents(8000)).unwrap();
        assert_eq!(account.overdraft_limit(), Money::from_cents(8000));

        let mut plain = savings(0);
        assert!(plain.set_overdraft_limit(Money::from_cents(1)).is_err());
        assert!(plain.set_overdraft_limit(Money::zero()).is_ok());
    }

    #[test]
    fn test_display_name() {
        let mut account = savings(0);
        assert_eq!(account.display_name(), "Savings");
        account.set_nickname(Some("Rainy Day".into())).unwrap();
        assert_eq!(account.display_name(), "Rainy Day (Savings)");
    }

    #[test]
    fn test_kind_capabilities() {
        assert!(AccountKind::Current.allows_overdraft());
        assert!(!AccountKind::Savings.allows_overdraft());
        assert!(AccountKind::Salary.earns_interest());
        assert!(!AccountKind::Current.earns_interest());
        assert_eq!(AccountKind::parse("SAVINGS"), Some(AccountKind::Savings));
        assert_eq!(AccountKind::parse("invalid"), None);
    }

    #[test]
    fn test_serialization() {
        let account = current(1234, 500);
        let json = serde_json::to_string(&account).unwrap();
        let back: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(account, back);
    }
}
