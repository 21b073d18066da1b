//! In-memory idempotency cache for retried Credit/Debit calls.
//!
//! Sits in front of the durable `i/` records in sled: a hit here avoids a
//! store read on the hot retry path. Bounded with ordered eviction, so the
//! durable record remains the source of truth for older keys.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::models::account::AccountId;
use crate::models::bonus_pack::PackId;
use crate::models::ledger_entry::EntryId;

/// Outcome of the original mutation, replayed verbatim on a duplicate key.
/// Keys are scoped to the account that first used them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub account_id: AccountId,
    pub entry_id: EntryId,
    pub resulting_balance: u64,
    pub applied_at_ms: i64,
    /// Pack granted in the same commit, set by purchase flows.
    pub granted_pack: Option<PackId>,
}

pub struct IdempotencyGuard {
    cache: IndexMap<String, IdempotencyRecord>,
    capacity: usize,
}

impl IdempotencyGuard {
    pub fn new(capacity: usize) -> Self {
        Self { cache: IndexMap::with_capacity(capacity), capacity: capacity.max(1) }
    }

    pub fn lookup(&self, key: &str) -> Option<IdempotencyRecord> {
        self.cache.get(key).copied()
    }

    pub fn record(&mut self, key: &str, rec: IdempotencyRecord) {
        if self.cache.len() >= self.capacity {
            // Evict oldest insertion
            self.cache.shift_remove_index(0);
        }
        self.cache.insert(key.to_string(), rec);
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
