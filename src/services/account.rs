//! Account service
//!
//! User registration and account lifecycle: opening, renaming, overdraft
//! changes, deactivation and reactivation.

use crate::audit::{AuditEntry, Operation};
use crate::auth;
use crate::error::{EngineError, EngineResult};
use crate::models::{Account, AccountKind, AccountRef, Ledger, Money, User};
use crate::storage::Storage;

/// Service for users and account management
pub struct AccountService<'a> {
    storage: &'a Storage,
}

impl<'a> AccountService<'a> {
    /// Create a new account service
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Register a new user with a policy-checked password
    pub fn register_user(&self, username: &str, password: &str, email: &str) -> EngineResult<User> {
        let result = auth::validate_password(password)
            .and_then(|_| auth::hash_password(password))
            .and_then(|hash| User::new(username, hash, email))
            .and_then(|user| {
                let mut ledger = self.storage.write()?;
                ledger.add_user(user).cloned()
            });

        let entry = match &result {
            Ok(user) => AuditEntry::applied(&user.username, Operation::RegisterUser),
            Err(e) => AuditEntry::rejected(username, Operation::RegisterUser, e),
        };
        self.storage.record(entry);

        result
    }

    /// Check a user's password
    pub fn authenticate(&self, username: &str, password: &str) -> EngineResult<()> {
        let ledger = self.storage.read()?;
        auth::authenticate(&ledger, username, password)
    }

    /// Open a new account for a user
    pub fn open_account(
        &self,
        username: &str,
        kind: AccountKind,
        nickname: Option<String>,
        opening_balance: Money,
        overdraft_limit: Money,
    ) -> EngineResult<Account> {
        let result = self.storage.write().and_then(|mut ledger| {
            open_in(
                &mut ledger,
                username,
                kind,
                nickname,
                opening_balance,
                overdraft_limit,
            )
        });

        let entry = match &result {
            Ok(account) => AuditEntry::applied(username, Operation::OpenAccount)
                .with_account(account.id)
                .with_amount(account.balance())
                .with_detail(account.kind.as_str()),
            Err(e) => AuditEntry::rejected(username, Operation::OpenAccount, e)
                .with_detail(kind.as_str()),
        };
        self.storage.record(entry);

        result
    }

    /// Get all of a user's accounts
    pub fn list(&self, username: &str, include_inactive: bool) -> EngineResult<Vec<Account>> {
        let ledger = self.storage.read()?;
        let accounts = ledger
            .user(username)?
            .accounts()
            .iter()
            .filter(|a| include_inactive || a.is_active())
            .cloned()
            .collect();
        Ok(accounts)
    }

    /// Find one account by id, short id, nickname, or kind
    pub fn find(&self, username: &str, account: &AccountRef) -> EngineResult<Account> {
        let ledger = self.storage.read()?;
        ledger.user(username)?.account(account).cloned()
    }

    /// Sum of a user's balances across all accounts
    pub fn total_balance(&self, username: &str) -> EngineResult<Money> {
        let ledger = self.storage.read()?;
        Ok(ledger.user(username)?.total_balance())
    }

    /// Deactivate an account; it stays readable but rejects mutations
    pub fn deactivate(&self, username: &str, account: &AccountRef) -> EngineResult<Account> {
        self.modify(username, account, Operation::Deactivate, |_, account| {
            if !account.is_active() {
                return Err(EngineError::Validation(format!(
                    "Account '{}' is already inactive",
                    account.display_name()
                )));
            }
            account.deactivate();
            Ok(())
        })
    }

    /// Reactivate a deactivated account
    pub fn reactivate(&self, username: &str, account: &AccountRef) -> EngineResult<Account> {
        self.modify(username, account, Operation::Reactivate, |_, account| {
            if account.is_active() {
                return Err(EngineError::Validation(format!(
                    "Account '{}' is already active",
                    account.display_name()
                )));
            }
            account.reactivate();
            Ok(())
        })
    }

    /// Set or clear an account nickname
    pub fn set_nickname(
        &self,
        username: &str,
        account: &AccountRef,
        nickname: Option<String>,
    ) -> EngineResult<Account> {
        self.modify(username, account, Operation::Rename, move |others, account| {
            if let Some(nickname) = &nickname {
                others.ensure_nickname_free(nickname, Some(account.id))?;
            }
            account.set_nickname(nickname)
        })
    }

    /// Change the overdraft limit of a current account
    pub fn set_overdraft_limit(
        &self,
        username: &str,
        account: &AccountRef,
        limit: Money,
    ) -> EngineResult<Account> {
        self.modify(username, account, Operation::SetOverdraft, |_, account| {
            account.set_overdraft_limit(limit)
        })
    }

    /// Run a change against one account under the write lock, then audit it
    fn modify<F>(
        &self,
        username: &str,
        account_ref: &AccountRef,
        operation: Operation,
        change: F,
    ) -> EngineResult<Account>
    where
        F: FnOnce(&User, &mut Account) -> EngineResult<()>,
    {
        let result = self
            .storage
            .write()
            .and_then(|mut ledger| modify_in(&mut ledger, username, account_ref, change));

        let entry = match &result {
            Ok(account) => AuditEntry::applied(username, operation).with_account(account.id),
            Err(e) => AuditEntry::rejected(username, operation, e)
                .with_detail(account_ref.to_string()),
        };
        self.storage.record(entry);

        result
    }
}

pub(super) fn open_in(
    ledger: &mut Ledger,
    username: &str,
    kind: AccountKind,
    nickname: Option<String>,
    opening_balance: Money,
    overdraft_limit: Money,
) -> EngineResult<Account> {
    let account = Account::open(kind, nickname, opening_balance, overdraft_limit)?;
    ledger.user_mut(username)?.add_account(account).cloned()
}

pub(super) fn modify_in<F>(
    ledger: &mut Ledger,
    username: &str,
    account_ref: &AccountRef,
    change: F,
) -> EngineResult<Account>
where
    F: FnOnce(&User, &mut Account) -> EngineResult<()>,
{
    let user = ledger.user_mut(username)?;
    let index = user.account_index(account_ref)?;

    // Work on a copy so uniqueness checks can read the untouched user
    let mut account = user.accounts()[index].clone();
    change(user, &mut account)?;

    let slot = user.account_mut(&AccountRef::from(account.id))?;
    *slot = account.clone();
    Ok(account)
}
