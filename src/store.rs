//! Durable keyspace over one sled tree.
//!
//! Key layout (big-endian ids so prefix scans come back ordered):
//!   a/{account}                    -> Account
//!   e/{account}{timestamp}{entry}  -> LedgerEntry          (append-only)
//!   i/{idempotency_key}            -> IdempotencyRecord
//!   p/{account}{pack}              -> BonusPack            (never deleted)
//!   u/{account}{business}{day}     -> AllowancePool
//!   c/{account}{timestamp}{event}  -> ConsumptionEvent     (append-only)
//!
//! Every mutating operation builds one `sled::Batch` and commits it through
//! `apply`, which flushes before acknowledging. An operation either fully
//! commits or leaves no trace.

use std::collections::HashMap;
use std::hash::Hash;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::idempotency::IdempotencyRecord;
use crate::models::account::{Account, AccountId, BusinessId};
use crate::models::allowance::{AllowancePool, ConsumptionEvent};
use crate::models::bonus_pack::{BonusPack, PackId};
use crate::models::errors::LedgerError;
use crate::models::ledger_entry::{EntryId, LedgerEntry};

pub struct LedgerDb {
    db: sled::Db,
}

// ==========================================
// Key builders
// ==========================================

fn account_key(account_id: AccountId) -> Vec<u8> {
    let mut k = Vec::with_capacity(10);
    k.extend_from_slice(b"a/");
    k.extend_from_slice(&account_id.to_be_bytes());
    k
}

fn entry_prefix(account_id: AccountId) -> Vec<u8> {
    let mut k = Vec::with_capacity(10);
    k.extend_from_slice(b"e/");
    k.extend_from_slice(&account_id.to_be_bytes());
    k
}

fn entry_key(account_id: AccountId, timestamp_ms: i64, entry_id: EntryId) -> Vec<u8> {
    let mut k = entry_prefix(account_id);
    k.extend_from_slice(&(timestamp_ms as u64).to_be_bytes());
    k.extend_from_slice(&entry_id.to_be_bytes());
    k
}

fn idem_key(idempotency_key: &str) -> Vec<u8> {
    let mut k = Vec::with_capacity(2 + idempotency_key.len());
    k.extend_from_slice(b"i/");
    k.extend_from_slice(idempotency_key.as_bytes());
    k
}

fn pack_prefix(account_id: AccountId) -> Vec<u8> {
    let mut k = Vec::with_capacity(10);
    k.extend_from_slice(b"p/");
    k.extend_from_slice(&account_id.to_be_bytes());
    k
}

fn pack_key(account_id: AccountId, pack_id: PackId) -> Vec<u8> {
    let mut k = pack_prefix(account_id);
    k.extend_from_slice(&pack_id.to_be_bytes());
    k
}

fn pool_key(account_id: AccountId, business_id: BusinessId, day_key: i32) -> Vec<u8> {
    let mut k = Vec::with_capacity(22);
    k.extend_from_slice(b"u/");
    k.extend_from_slice(&account_id.to_be_bytes());
    k.extend_from_slice(&business_id.to_be_bytes());
    k.extend_from_slice(&(day_key as u32).to_be_bytes());
    k
}

fn consume_prefix(account_id: AccountId) -> Vec<u8> {
    let mut k = Vec::with_capacity(10);
    k.extend_from_slice(b"c/");
    k.extend_from_slice(&account_id.to_be_bytes());
    k
}

fn consume_key(account_id: AccountId, timestamp_ms: i64, event_id: u64) -> Vec<u8> {
    let mut k = consume_prefix(account_id);
    k.extend_from_slice(&(timestamp_ms as u64).to_be_bytes());
    k.extend_from_slice(&event_id.to_be_bytes());
    k
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, LedgerError> {
    Ok(bincode::deserialize(bytes)?)
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, LedgerError> {
    Ok(bincode::serialize(value)?)
}

/// Half-open [from_ms, to_ms) range under a time-keyed prefix.
fn time_range(prefix: Vec<u8>, from_ms: i64, to_ms: i64) -> (Vec<u8>, Vec<u8>) {
    let mut start = prefix.clone();
    start.extend_from_slice(&(from_ms.max(0) as u64).to_be_bytes());
    let mut end = prefix;
    end.extend_from_slice(&(to_ms.max(0) as u64).to_be_bytes());
    (start, end)
}

impl LedgerDb {
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        Ok(Self { db: sled::open(path)? })
    }

    /// Commit one operation's writes atomically, then flush.
    pub fn apply(&self, batch: sled::Batch) -> Result<(), LedgerError> {
        self.db.apply_batch(batch)?;
        self.db.flush()?;
        Ok(())
    }

    // ---- accounts ----

    pub fn get_account(&self, account_id: AccountId) -> Result<Option<Account>, LedgerError> {
        match self.db.get(account_key(account_id))? {
            Some(v) => Ok(Some(decode(&v)?)),
            None => Ok(None),
        }
    }

    pub fn batch_put_account(
        batch: &mut sled::Batch,
        account_id: AccountId,
        account: &Account,
    ) -> Result<(), LedgerError> {
        batch.insert(account_key(account_id), encode(account)?);
        Ok(())
    }

    // ---- ledger entries ----

    pub fn batch_put_entry(batch: &mut sled::Batch, entry: &LedgerEntry) -> Result<(), LedgerError> {
        batch.insert(
            entry_key(entry.account_id, entry.timestamp_ms, entry.entry_id),
            encode(entry)?,
        );
        Ok(())
    }

    /// All entries for an account, oldest first.
    pub fn entries_for_account(
        &self,
        account_id: AccountId,
    ) -> impl Iterator<Item = Result<LedgerEntry, LedgerError>> {
        self.db.scan_prefix(entry_prefix(account_id)).map(|item| {
            let (_, v) = item.map_err(LedgerError::from)?;
            decode(&v)
        })
    }

    /// Entries in [from_ms, to_ms), oldest first.
    pub fn entries_in_window(
        &self,
        account_id: AccountId,
        from_ms: i64,
        to_ms: i64,
    ) -> impl Iterator<Item = Result<LedgerEntry, LedgerError>> {
        let (start, end) = time_range(entry_prefix(account_id), from_ms, to_ms);
        self.db.range(start..end).map(|item| {
            let (_, v) = item.map_err(LedgerError::from)?;
            decode(&v)
        })
    }

    // ---- idempotency records ----

    pub fn get_idempotency(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<IdempotencyRecord>, LedgerError> {
        match self.db.get(idem_key(idempotency_key))? {
            Some(v) => Ok(Some(decode(&v)?)),
            None => Ok(None),
        }
    }

    pub fn batch_put_idempotency(
        batch: &mut sled::Batch,
        idempotency_key: &str,
        rec: &IdempotencyRecord,
    ) -> Result<(), LedgerError> {
        batch.insert(idem_key(idempotency_key), encode(rec)?);
        Ok(())
    }

    /// Delete durable idempotency records applied before `before_ms`.
    /// Returns the number removed.
    pub fn gc_idempotency(&self, before_ms: i64) -> Result<usize, LedgerError> {
        let mut batch = sled::Batch::default();
        let mut removed = 0usize;
        for item in self.db.scan_prefix(b"i/") {
            let (k, v) = item?;
            let rec: IdempotencyRecord = decode(&v)?;
            if rec.applied_at_ms < before_ms {
                batch.remove(k);
                removed += 1;
            }
        }
        if removed > 0 {
            self.apply(batch)?;
        }
        Ok(removed)
    }

    // ---- bonus packs ----

    pub fn get_pack(
        &self,
        account_id: AccountId,
        pack_id: PackId,
    ) -> Result<Option<BonusPack>, LedgerError> {
        match self.db.get(pack_key(account_id, pack_id))? {
            Some(v) => Ok(Some(decode(&v)?)),
            None => Ok(None),
        }
    }

    pub fn batch_put_pack(batch: &mut sled::Batch, pack: &BonusPack) -> Result<(), LedgerError> {
        batch.insert(pack_key(pack.account_id, pack.pack_id), encode(pack)?);
        Ok(())
    }

    pub fn packs_for_account(&self, account_id: AccountId) -> Result<Vec<BonusPack>, LedgerError> {
        let mut packs = Vec::new();
        for item in self.db.scan_prefix(pack_prefix(account_id)) {
            let (_, v) = item?;
            packs.push(decode(&v)?);
        }
        Ok(packs)
    }

    /// Every pack in the store, for the expiry sweep.
    pub fn all_packs(&self) -> impl Iterator<Item = Result<BonusPack, LedgerError>> {
        self.db.scan_prefix(b"p/").map(|item| {
            let (_, v) = item.map_err(LedgerError::from)?;
            decode(&v)
        })
    }

    // ---- allowance pools ----

    pub fn get_pool(
        &self,
        account_id: AccountId,
        business_id: BusinessId,
        day_key: i32,
    ) -> Result<Option<AllowancePool>, LedgerError> {
        match self.db.get(pool_key(account_id, business_id, day_key))? {
            Some(v) => Ok(Some(decode(&v)?)),
            None => Ok(None),
        }
    }

    pub fn batch_put_pool(batch: &mut sled::Batch, pool: &AllowancePool) -> Result<(), LedgerError> {
        batch.insert(
            pool_key(pool.account_id, pool.business_id, pool.day_key),
            encode(pool)?,
        );
        Ok(())
    }

    // ---- consumption events ----

    pub fn batch_put_consumption(
        batch: &mut sled::Batch,
        event: &ConsumptionEvent,
    ) -> Result<(), LedgerError> {
        batch.insert(
            consume_key(event.account_id, event.timestamp_ms, event.event_id),
            encode(event)?,
        );
        Ok(())
    }

    /// Consumption events in [from_ms, to_ms), oldest first.
    pub fn consumption_in_window(
        &self,
        account_id: AccountId,
        from_ms: i64,
        to_ms: i64,
    ) -> impl Iterator<Item = Result<ConsumptionEvent, LedgerError>> {
        let (start, end) = time_range(consume_prefix(account_id), from_ms, to_ms);
        self.db.range(start..end).map(|item| {
            let (_, v) = item.map_err(LedgerError::from)?;
            decode(&v)
        })
    }
}

// ==========================================
// Per-key mutation locks
// ==========================================

/// Lazily-populated table of per-key mutexes. Different keys never contend;
/// the outer map lock is held only long enough to clone the entry.
///
/// Once the table passes `IDLE_SHRINK_THRESHOLD` entries, acquisition drops
/// locks nobody holds (strong count 1 means only the map references them),
/// keeping the table bounded by the live working set.
pub struct LockTable<K: Eq + Hash + Copy> {
    inner: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

const IDLE_SHRINK_THRESHOLD: usize = 1024;

impl<K: Eq + Hash + Copy> Default for LockTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Copy> LockTable<K> {
    pub fn new() -> Self {
        Self { inner: Mutex::new(HashMap::new()) }
    }

    pub fn acquire(&self, key: K) -> Arc<Mutex<()>> {
        // A poisoned map only means another thread panicked while cloning an
        // Arc; the map itself is still usable.
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if map.len() >= IDLE_SHRINK_THRESHOLD {
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        map.entry(key).or_default().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_keys_sort_by_time_then_id() {
        let k1 = entry_key(5, 100, 1);
        let k2 = entry_key(5, 100, 2);
        let k3 = entry_key(5, 200, 1);
        assert!(k1 < k2);
        assert!(k2 < k3);
    }

    #[test]
    fn test_time_range_is_half_open() {
        let (start, end) = time_range(entry_prefix(5), 100, 200);
        assert!(start < end);
        assert_eq!(start, entry_key(5, 100, 0)[..18].to_vec());
    }

    #[test]
    fn test_lock_table_reuses_locks() {
        let table: LockTable<u64> = LockTable::new();
        let a = table.acquire(1);
        let b = table.acquire(1);
        assert!(Arc::ptr_eq(&a, &b));
        let c = table.acquire(2);
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_lock_table_shrinks_idle_locks() {
        let table: LockTable<u64> = LockTable::new();
        let held = table.acquire(0);

        // Idle entries (dropped immediately) are reclaimed once the table
        // passes the threshold; the held lock survives every shrink pass.
        for k in 1..=(IDLE_SHRINK_THRESHOLD as u64 * 2) {
            let _ = table.acquire(k);
        }
        assert!(table.len() <= IDLE_SHRINK_THRESHOLD + 1);
        assert!(Arc::ptr_eq(&held, &table.acquire(0)));
    }
}
