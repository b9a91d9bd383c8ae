//! The persisted ledger snapshot
//!
//! A [`Ledger`] is the whole user/account/transaction graph and the unit of
//! atomic durability: a save replaces it wholesale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::user::User;
use crate::error::{EngineError, EngineResult};

/// Current on-disk schema version
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub schema_version: u32,

    /// Set by the persistence layer on every save
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,

    users: BTreeMap<String, User>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// An empty ledger, as used on first run
    pub fn new() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            saved_at: None,
            users: BTreeMap::new(),
        }
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn contains_user(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }

    pub fn user(&self, username: &str) -> EngineResult<&User> {
        self.users
            .get(username)
            .ok_or_else(|| EngineError::user_not_found(username))
    }

    pub fn user_mut(&mut self, username: &str) -> EngineResult<&mut User> {
        self.users
            .get_mut(username)
            .ok_or_else(|| EngineError::user_not_found(username))
    }

    /// Insert a new user; usernames are unique
    pub fn add_user(&mut self, user: User) -> EngineResult<&User> {
        if self.users.contains_key(&user.username) {
            return Err(EngineError::Duplicate {
                entity_type: "User",
                identifier: user.username,
            });
        }
        let key = user.username.clone();
        Ok(self.users.entry(key).or_insert(user))
    }

    /// Total number of transactions across every account
    pub fn transaction_count(&self) -> usize {
        self.users
            .values()
            .flat_map(|u| u.accounts())
            .map(|a| a.transactions().len())
            .sum()
    }

    /// Every account satisfies its balance invariants
    pub fn invariants_hold(&self) -> bool {
        self.users
            .values()
            .flat_map(|u| u.accounts())
            .all(|a| a.invariants_hold())
    }
}
