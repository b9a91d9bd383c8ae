//! User model
//!
//! A user owns an ordered list of accounts. Account kind and nickname are
//! each unique per user, which keeps lookups by either unambiguous.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::account::{Account, AccountKind};
use super::ids::AccountId;
use crate::error::{EngineError, EngineResult};

/// Maximum username length
pub const MAX_USERNAME_LEN: usize = 32;

/// A caller-supplied reference to one of a user's accounts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountRef {
    /// Exact account id
    Id(AccountId),
    /// Short id (`acc-1a2b3c4d`), nickname, or account kind name
    Label(String),
}

impl AccountRef {
    /// Classify free text: a full UUID becomes an id, anything else a label
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        match s.parse::<AccountId>() {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Label(s.to_string()),
        }
    }

    fn matches(&self, account: &Account) -> bool {
        match self {
            Self::Id(id) => account.id == *id,
            Self::Label(label) => {
                account.id.matches(label)
                    || account
                        .nickname
                        .as_deref()
                        .is_some_and(|n| n.eq_ignore_ascii_case(label))
            }
        }
    }
}

impl From<AccountId> for AccountRef {
    fn from(id: AccountId) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for AccountRef {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Label(label) => write!(f, "{}", label),
        }
    }
}

/// A ledger user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique name, also the key in the snapshot
    pub username: String,

    /// Opaque credential hash owned by the auth layer
    pub credential_hash: String,

    pub email: String,

    pub created_at: DateTime<Utc>,

    accounts: Vec<Account>,
}

impl User {
    /// Create a user after validating name and email
    pub fn new(
        username: &str,
        credential_hash: impl Into<String>,
        email: &str,
    ) -> EngineResult<Self> {
        let username = validate_username(username)?;
        let email = validate_email(email)?;
        Ok(Self {
            username,
            credential_hash: credential_hash.into(),
            email,
            created_at: Utc::now(),
            accounts: Vec::new(),
        })
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// Resolve an account reference.
    ///
    /// Order: exact id, short id or nickname, then account kind.
    pub fn account_index(&self, account_ref: &AccountRef) -> EngineResult<usize> {
        if let Some(index) = self.accounts.iter().position(|a| account_ref.matches(a)) {
            return Ok(index);
        }

        if let AccountRef::Label(label) = account_ref {
            if let Some(kind) = AccountKind::parse(label) {
                if let Some(index) = self.accounts.iter().position(|a| a.kind == kind) {
                    return Ok(index);
                }
            }
        }

        Err(EngineError::account_not_found(account_ref.to_string()))
    }

    pub fn account(&self, account_ref: &AccountRef) -> EngineResult<&Account> {
        let index = self.account_index(account_ref)?;
        Ok(&self.accounts[index])
    }

    pub fn account_mut(&mut self, account_ref: &AccountRef) -> EngineResult<&mut Account> {
        let index = self.account_index(account_ref)?;
        Ok(&mut self.accounts[index])
    }

    /// Borrow two distinct accounts mutably at once
    pub(crate) fn account_pair_mut(
        &mut self,
        first: usize,
        second: usize,
    ) -> (&mut Account, &mut Account) {
        assert_ne!(first, second, "account pair must be two distinct accounts");
        if first < second {
            let (left, right) = self.accounts.split_at_mut(second);
            (&mut left[first], &mut right[0])
        } else {
            let (left, right) = self.accounts.split_at_mut(first);
            (&mut right[0], &mut left[second])
        }
    }

    /// Add an account, enforcing per-user uniqueness of kind and nickname
    pub fn add_account(&mut self, account: Account) -> EngineResult<&Account> {
        if self.accounts.iter().any(|a| a.kind == account.kind) {
            return Err(EngineError::Duplicate {
                entity_type: "Account",
                identifier: account.kind.as_str().to_string(),
            });
        }
        if let Some(nickname) = &account.nickname {
            self.ensure_nickname_free(nickname, None)?;
        }

        self.accounts.push(account);
        Ok(&self.accounts[self.accounts.len() - 1])
    }

    /// Check no other account already uses this nickname
    pub fn ensure_nickname_free(
        &self,
        nickname: &str,
        exclude: Option<AccountId>,
    ) -> EngineResult<()> {
        let nickname = nickname.trim();
        let taken = self.accounts.iter().any(|a| {
            Some(a.id) != exclude
                && a
                    .nickname
                    .as_deref()
                    .is_some_and(|n| n.eq_ignore_ascii_case(nickname))
        });
        if taken {
            return Err(EngineError::Duplicate {
                entity_type: "Nickname",
                identifier: nickname.to_string(),
            });
        }
        Ok(())
    }

    /// Sum of all account balances
    pub fn total_balance(&self) -> crate::models::Money {
        self.accounts.iter().map(|a| a.balance()).sum()
    }
}

fn validate_username(username: &str) -> EngineResult<String> {
    let username = username.trim();
    if username.is_empty() {
        return Err(EngineError::Validation("Username cannot be empty".into()));
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(EngineError::Validation(format!(
            "Username too long (max {} chars)",
            MAX_USERNAME_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(EngineError::Validation(
            "Username can only contain letters, numbers, and underscore".into(),
        ));
    }
    Ok(username.to_string())
}

fn validate_email(email: &str) -> EngineResult<String> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    };
    if !valid {
        return Err(EngineError::Validation(format!(
            "Invalid email address: '{}'",
            email
        )));
    }
    Ok(email.to_string())
}
