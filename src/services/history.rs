//! History service
//!
//! Read-only views over recorded transactions: filtering, sorting,
//! pagination and summaries. The pure functions work on any slice of
//! entries; [`HistoryService`] feeds them from the ledger under the read
//! lock.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::error::{EngineError, EngineResult};
use crate::models::{AccountId, AccountRef, Money, Transaction, TransactionKind, User};
use crate::storage::Storage;

/// A transaction together with the account it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub account_id: AccountId,
    pub account_name: String,
    #[serde(flatten)]
    pub transaction: Transaction,
}

/// Criteria for selecting history entries. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub account: Option<AccountId>,
    /// Inclusive start date (UTC)
    pub from: Option<NaiveDate>,
    /// Inclusive end date (UTC)
    pub to: Option<NaiveDate>,
    /// Kinds to keep; empty keeps every kind
    pub kinds: Vec<TransactionKind>,
    /// Inclusive lower bound on the amount magnitude
    pub min_amount: Option<Money>,
    /// Inclusive upper bound on the amount magnitude
    pub max_amount: Option<Money>,
}

impl HistoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(mut self, account: AccountId) -> Self {
        self.account = Some(account);
        self
    }

    pub fn date_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn kinds(mut self, kinds: impl IntoIterator<Item = TransactionKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    pub fn amount_range(mut self, min: Option<Money>, max: Option<Money>) -> Self {
        self.min_amount = min;
        self.max_amount = max;
        self
    }

    /// Reject ranges that can never match
    pub fn validate(&self) -> EngineResult<()> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(EngineError::Validation(format!(
                    "start date {} is after end date {}",
                    from, to
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_amount, self.max_amount) {
            if min > max {
                return Err(EngineError::Validation(format!(
                    "minimum amount {} is above maximum amount {}",
                    min, max
                )));
            }
        }
        Ok(())
    }

    /// Check if an entry passes every criterion
    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        let txn = &entry.transaction;
        let date = txn.created_at.date_naive();

        if self.account.is_some_and(|id| id != entry.account_id) {
            return false;
        }
        if self.from.is_some_and(|from| date < from) {
            return false;
        }
        if self.to.is_some_and(|to| date > to) {
            return false;
        }
        if !self.kinds.is_empty() && !self.kinds.contains(&txn.kind) {
            return false;
        }
        if self.min_amount.is_some_and(|min| txn.amount.abs() < min) {
            return false;
        }
        if self.max_amount.is_some_and(|max| txn.amount.abs() > max) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Date,
    Amount,
    Kind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// Sort specification; the default is newest first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sort {
    pub key: SortKey,
    pub order: SortOrder,
}

impl Sort {
    pub fn new(key: SortKey, order: SortOrder) -> Self {
        Self { key, order }
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-indexed page number
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

pub type HistoryPage = Page<HistoryEntry>;

/// Count and sum for one transaction kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindTotal {
    pub count: usize,
    pub total: Money,
}

/// Aggregate figures over a set of transactions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistorySummary {
    pub count: usize,
    pub by_kind: BTreeMap<TransactionKind, KindTotal>,
    pub total_in: Money,
    pub total_out: Money,
    /// Inflows minus outflows
    pub net_change: Money,
    pub min_amount: Option<Money>,
    pub max_amount: Option<Money>,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
}

/// Keep entries matching the filter, preserving order
pub fn filter(entries: &[HistoryEntry], filter: &HistoryFilter) -> Vec<HistoryEntry> {
    entries.iter().filter(|e| filter.matches(e)).cloned().collect()
}

/// Stable sort; ties keep their chronological order
pub fn sort(entries: &mut [HistoryEntry], sort: Sort) {
    entries.sort_by(|a, b| {
        let (a, b) = (&a.transaction, &b.transaction);
        let ordering = match sort.key {
            SortKey::Date => a.created_at.cmp(&b.created_at),
            SortKey::Amount => a.amount.cmp(&b.amount),
            SortKey::Kind => a.kind.cmp(&b.kind),
        };
        match sort.order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    });
}

/// Slice out a 1-indexed page. A page past the end is empty.
pub fn paginate<T: Clone>(items: &[T], page_size: usize, page: usize) -> EngineResult<Page<T>> {
    if page_size == 0 {
        return Err(EngineError::Validation(
            "page size must be at least 1".into(),
        ));
    }
    if page == 0 {
        return Err(EngineError::Validation("pages are numbered from 1".into()));
    }

    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size);
    let start = (page - 1).saturating_mul(page_size).min(total_items);
    let end = start.saturating_add(page_size).min(total_items);

    Ok(Page {
        items: items[start..end].to_vec(),
        page,
        page_size,
        total_items,
        total_pages,
    })
}

/// Summarize a set of transactions.
///
/// Totals are exact; a set whose sums leave the representable range is
/// rejected with `InvalidAmount` instead of being clamped.
pub fn summarize<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
) -> EngineResult<HistorySummary> {
    let mut summary = HistorySummary::default();

    for txn in transactions {
        summary.count += 1;

        let kind_total = summary.by_kind.entry(txn.kind).or_default();
        kind_total.count += 1;
        kind_total.total = accumulate(kind_total.total, txn.amount)?;

        if txn.kind.is_inflow() {
            summary.total_in = accumulate(summary.total_in, txn.amount)?;
        } else {
            summary.total_out = accumulate(summary.total_out, txn.amount)?;
        }

        summary.min_amount = Some(summary.min_amount.map_or(txn.amount, |m| m.min(txn.amount)));
        summary.max_amount = Some(summary.max_amount.map_or(txn.amount, |m| m.max(txn.amount)));
        summary.first = Some(summary.first.map_or(txn.created_at, |t| t.min(txn.created_at)));
        summary.last = Some(summary.last.map_or(txn.created_at, |t| t.max(txn.created_at)));
    }

    summary.net_change = summary
        .total_in
        .checked_sub(summary.total_out)
        .ok_or_else(totals_overflow)?;
    Ok(summary)
}

fn accumulate(total: Money, amount: Money) -> EngineResult<Money> {
    total.checked_add(amount).ok_or_else(totals_overflow)
}

fn totals_overflow() -> EngineError {
    EngineError::InvalidAmount("history totals exceed the representable range".into())
}

/// Gather a user's entries in chronological order, optionally for one account
pub fn collect_entries(user: &User, account: Option<&AccountRef>) -> EngineResult<Vec<HistoryEntry>> {
    let accounts = match account {
        Some(account_ref) => vec![user.account(account_ref)?],
        None => user.accounts().iter().collect(),
    };

    let mut entries: Vec<HistoryEntry> = accounts
        .into_iter()
        .flat_map(|account| {
            let name = account.display_name();
            account.transactions().iter().map(move |txn| HistoryEntry {
                account_id: account.id,
                account_name: name.clone(),
                transaction: txn.clone(),
            })
        })
        .collect();

    entries.sort_by_key(|e| e.transaction.created_at);
    Ok(entries)
}

/// Service for history queries
pub struct HistoryService<'a> {
    storage: &'a Storage,
}

impl<'a> HistoryService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Every matching entry, sorted
    pub fn entries(
        &self,
        username: &str,
        account: Option<&AccountRef>,
        history_filter: &HistoryFilter,
        order: Sort,
    ) -> EngineResult<Vec<HistoryEntry>> {
        history_filter.validate()?;

        let ledger = self.storage.read()?;
        let all = collect_entries(ledger.user(username)?, account)?;
        drop(ledger);

        let mut selected = filter(&all, history_filter);
        sort(&mut selected, order);
        Ok(selected)
    }

    /// One page of matching entries
    pub fn query_history(
        &self,
        username: &str,
        account: Option<&AccountRef>,
        history_filter: &HistoryFilter,
        order: Sort,
        page: usize,
        page_size: usize,
    ) -> EngineResult<HistoryPage> {
        let selected = self.entries(username, account, history_filter, order)?;
        paginate(&selected, page_size, page)
    }

    /// Summary of every matching entry
    pub fn summary(
        &self,
        username: &str,
        account: Option<&AccountRef>,
        history_filter: &HistoryFilter,
    ) -> EngineResult<HistorySummary> {
        let selected = self.entries(username, account, history_filter, Sort::default())?;
        summarize(selected.iter().map(|e| &e.transaction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Settings, TallyPaths};
    use crate::models::{Account, AccountKind, EntryDraft};
    use crate::services::LedgerService;
    use chrono::Duration;
    use tempfile::TempDir;

    fn txn(kind: TransactionKind, cents: i64, days_ago: i64) -> Transaction {
        EntryDraft::new(kind).into_transaction(
            Money::from_cents(cents),
            Money::zero(),
            Utc::now() - Duration::days(days_ago),
        )
    }

    fn entry(kind: TransactionKind, cents: i64, days_ago: i64) -> HistoryEntry {
        HistoryEntry {
            account_id: AccountId::new(),
            account_name: "Savings".into(),
            transaction: txn(kind, cents, days_ago),
        }
    }

    fn sample() -> Vec<HistoryEntry> {
        vec![
            entry(TransactionKind::Deposit, 10000, 40),
            entry(TransactionKind::Withdrawal, 2500, 20),
            entry(TransactionKind::TransferOut, 700, 10),
            entry(TransactionKind::Interest, 125, 1),
        ]
    }

    #[test]
    fn test_filter_by_kind_and_amount() {
        let entries = sample();

        let outflows = HistoryFilter::new()
            .kinds([TransactionKind::Withdrawal, TransactionKind::TransferOut]);
        assert_eq!(filter(&entries, &outflows).len(), 2);

        let mid = HistoryFilter::new()
            .amount_range(Some(Money::from_cents(700)), Some(Money::from_cents(2500)));
        let kept = filter(&entries, &mid);
        assert_eq!(kept.len(), 2);
        // Original order preserved
        assert_eq!(kept[0].transaction.kind, TransactionKind::Withdrawal);
    }

    #[test]
    fn test_filter_by_date_range_is_inclusive() {
        let entries = sample();
        let day = entries[1].transaction.created_at.date_naive();

        let one_day = HistoryFilter::new().date_range(Some(day), Some(day));
        let kept = filter(&entries, &one_day);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].transaction.kind, TransactionKind::Withdrawal);
    }

    #[test]
    fn test_filter_validate() {
        let today = Utc::now().date_naive();
        let backwards = HistoryFilter::new().date_range(Some(today), today.pred_opt());
        assert!(backwards.validate().is_err());
        assert!(HistoryFilter::new().validate().is_ok());
    }

    #[test]
    fn test_sort() {
        let mut entries = sample();

        sort(&mut entries, Sort::default());
        assert_eq!(entries[0].transaction.kind, TransactionKind::Interest);

        sort(&mut entries, Sort::new(SortKey::Amount, SortOrder::Ascending));
        let amounts: Vec<i64> = entries.iter().map(|e| e.transaction.amount.cents()).collect();
        assert_eq!(amounts, vec![125, 700, 2500, 10000]);
    }

    #[test]
    fn test_paginate() {
        let items: Vec<u32> = (1..=7).collect();

        let first = paginate(&items, 3, 1).unwrap();
        assert_eq!(first.items, vec![1, 2, 3]);
        assert_eq!(first.total_items, 7);
        assert_eq!(first.total_pages, 3);
        assert!(first.has_next());

        let last = paginate(&items, 3, 3).unwrap();
        assert_eq!(last.items, vec![7]);
        assert!(!last.has_next());

        let past_end = paginate(&items, 3, 4).unwrap();
        assert!(past_end.is_empty());
        assert_eq!(past_end.total_pages, 3);
    }

    #[test]
    fn test_paginate_rejects_zero() {
        let items = vec![1, 2, 3];
        assert!(matches!(paginate(&items, 0, 1), Err(EngineError::Validation(_))));
        assert!(matches!(paginate(&items, 10, 0), Err(EngineError::Validation(_))));

        let empty: Vec<u32> = Vec::new();
        let page = paginate(&empty, 10, 1).unwrap();
        assert_eq!(page.total_pages, 0);
        assert!(page.is_empty());
    }

    #[test]
    fn test_summarize() {
        let entries = sample();
        let summary = summarize(entries.iter().map(|e| &e.transaction)).unwrap();

        assert_eq!(summary.count, 4);
        assert_eq!(summary.total_in, Money::from_cents(10125));
        assert_eq!(summary.total_out, Money::from_cents(3200));
        assert_eq!(summary.net_change, Money::from_cents(6925));
        assert_eq!(summary.min_amount, Some(Money::from_cents(125)));
        assert_eq!(summary.max_amount, Some(Money::from_cents(10000)));
        assert_eq!(summary.by_kind[&TransactionKind::Withdrawal].count, 1);
        assert_eq!(summary.first, Some(entries[0].transaction.created_at));
        assert_eq!(summary.last, Some(entries[3].transaction.created_at));

        let empty = summarize(std::iter::empty()).unwrap();
        assert_eq!(empty.count, 0);
        assert!(empty.first.is_none());
    }

    #[test]
    fn test_summarize_rejects_totals_beyond_range() {
        // Each balance stays in range while the sum of deposits does not
        let half = Money::from_cents(i64::MAX / 2 + 1);
        let mut account =
            Account::open(AccountKind::Savings, None, Money::zero(), Money::zero()).unwrap();
        account.credit(half).unwrap();
        account.debit(half).unwrap();
        account.credit(half).unwrap();

        let err = summarize(account.transactions()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));

        // Totals that fit are still exact
        let summary = summarize(&account.transactions()[..2]).unwrap();
        assert_eq!(summary.total_in, half);
        assert_eq!(summary.net_change, Money::zero());
    }

    fn create_test_storage() -> (TempDir, Storage) {
        let temp_dir = TempDir::new().unwrap();
        let paths = TallyPaths::with_base_dir(temp_dir.path().to_path_buf());
        let storage = Storage::new(paths, Settings::default()).unwrap();
        {
            let mut ledger = storage.write().unwrap();
            let mut user = User::new("alice", "hash", "alice@example.com").unwrap();
            for kind in [AccountKind::Savings, AccountKind::Current] {
                user.add_account(
                    Account::open(kind, None, Money::from_cents(10000), Money::zero()).unwrap(),
                )
                .unwrap();
            }
            ledger.add_user(user).unwrap();
        }
        (temp_dir, storage)
    }

    #[test]
    fn test_query_history() {
        let (_temp, storage) = create_test_storage();
        let ledger = LedgerService::new(&storage);
        for cents in [100, 200, 300] {
            ledger
                .deposit("alice", &"savings".into(), Money::from_cents(cents), None)
                .unwrap();
        }
        ledger
            .transfer("alice", &"savings".into(), &"current".into(), Money::from_cents(50), None)
            .unwrap();

        let service = HistoryService::new(&storage);

        let all = service
            .query_history("alice", None, &HistoryFilter::new(), Sort::default(), 1, 20)
            .unwrap();
        // Two opening deposits, three deposits, two transfer legs
        assert_eq!(all.total_items, 7);

        let savings = service
            .query_history(
                "alice",
                Some(&"savings".into()),
                &HistoryFilter::new(),
                Sort::default(),
                1,
                2,
            )
            .unwrap();
        assert_eq!(savings.total_items, 5);
        assert_eq!(savings.total_pages, 3);
        assert_eq!(savings.items[0].transaction.kind, TransactionKind::TransferOut);
    }

    #[test]
    fn test_query_history_is_idempotent() {
        let (_temp, storage) = create_test_storage();
        LedgerService::new(&storage)
            .withdraw("alice", &"current".into(), Money::from_cents(100), None)
            .unwrap();

        let service = HistoryService::new(&storage);
        let query = || {
            service
                .query_history("alice", None, &HistoryFilter::new(), Sort::default(), 1, 5)
                .unwrap()
        };
        assert_eq!(query(), query());
    }

    #[test]
    fn test_summary_for_user() {
        let (_temp, storage) = create_test_storage();
        let summary = HistoryService::new(&storage)
            .summary("alice", None, &HistoryFilter::new())
            .unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.net_change, Money::from_cents(20000));

        assert!(matches!(
            HistoryService::new(&storage).summary("bob", None, &HistoryFilter::new()),
            Err(EngineError::UserNotFound(_))
        ));
    }
}
