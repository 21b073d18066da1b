//! LedgerStore - the balance authority.
//!
//! Every currency movement appends exactly one durable entry and changes the
//! balance exactly once, committed together in one batch. Retried calls are
//! deduplicated by idempotency key and replay the original outcome.

use std::sync::{Arc, Mutex};

use crate::id_gen::TimeOrderedIdGen;
use crate::idempotency::{IdempotencyGuard, IdempotencyRecord};
use crate::models::account::{Account, AccountId};
use crate::models::bonus_pack::PackId;
use crate::models::errors::LedgerError;
use crate::models::ledger_entry::{EntryId, EntryReason, LedgerEntry};
use crate::store::{LedgerDb, LockTable};

/// Result of a credit/debit. `duplicate` marks an idempotent replay: the
/// original outcome, no new entry.
#[derive(Debug, Clone, Copy)]
pub struct MutationOutcome {
    pub entry_id: EntryId,
    pub resulting_balance: u64,
    pub duplicate: bool,
    /// Pack granted in the same commit, for purchase flows.
    pub granted_pack: Option<PackId>,
}

pub struct LedgerStore {
    db: Arc<LedgerDb>,
    account_locks: LockTable<AccountId>,
    idem_cache: Mutex<IdempotencyGuard>,
    ids: Mutex<TimeOrderedIdGen>,
}

impl LedgerStore {
    pub fn new(db: Arc<LedgerDb>, idem_cache_size: usize) -> Self {
        Self {
            db,
            account_locks: LockTable::new(),
            idem_cache: Mutex::new(IdempotencyGuard::new(idem_cache_size)),
            ids: Mutex::new(TimeOrderedIdGen::new()),
        }
    }

    pub fn credit(
        &self,
        account_id: AccountId,
        amount: u64,
        idempotency_key: &str,
        reason: EntryReason,
        as_of_ms: i64,
    ) -> Result<MutationOutcome, LedgerError> {
        self.apply_delta(account_id, amount, false, idempotency_key, reason, as_of_ms, |_| {
            Ok(None)
        })
    }

    pub fn debit(
        &self,
        account_id: AccountId,
        amount: u64,
        idempotency_key: &str,
        reason: EntryReason,
        as_of_ms: i64,
    ) -> Result<MutationOutcome, LedgerError> {
        self.apply_delta(account_id, amount, true, idempotency_key, reason, as_of_ms, |_| {
            Ok(None)
        })
    }

    /// Debit with caller-staged writes committed in the same batch. The
    /// staged writes land iff the debit lands; a replayed key returns the
    /// original outcome without re-running `stage`.
    pub fn debit_with<F>(
        &self,
        account_id: AccountId,
        amount: u64,
        idempotency_key: &str,
        reason: EntryReason,
        as_of_ms: i64,
        stage: F,
    ) -> Result<MutationOutcome, LedgerError>
    where
        F: FnOnce(&mut sled::Batch) -> Result<Option<PackId>, LedgerError>,
    {
        self.apply_delta(account_id, amount, true, idempotency_key, reason, as_of_ms, stage)
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_delta<F>(
        &self,
        account_id: AccountId,
        amount: u64,
        is_debit: bool,
        idempotency_key: &str,
        reason: EntryReason,
        as_of_ms: i64,
        stage: F,
    ) -> Result<MutationOutcome, LedgerError>
    where
        F: FnOnce(&mut sled::Batch) -> Result<Option<PackId>, LedgerError>,
    {
        if amount == 0 {
            return Err(LedgerError::InvalidInput("amount must be positive".to_string()));
        }
        if idempotency_key.is_empty() {
            return Err(LedgerError::InvalidInput("idempotency_key must not be empty".to_string()));
        }

        let lock = self.account_locks.acquire(account_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        // Replay path: memory cache first, then the durable record. A key
        // belongs to the account that first used it; reuse elsewhere is a
        // client bug, not a replay.
        if let Some(rec) = self.lookup_idempotency(idempotency_key)? {
            if rec.account_id != account_id {
                return Err(LedgerError::InvalidInput(format!(
                    "idempotency key '{}' already used by account {}",
                    idempotency_key, rec.account_id
                )));
            }
            log::debug!(
                "idempotent replay: account={} key={} entry={}",
                account_id,
                idempotency_key,
                rec.entry_id
            );
            return Ok(MutationOutcome {
                entry_id: rec.entry_id,
                resulting_balance: rec.resulting_balance,
                duplicate: true,
                granted_pack: rec.granted_pack,
            });
        }

        // Debug builds re-derive the entry sum before touching the balance.
        if cfg!(debug_assertions) {
            self.verify_account(account_id)?;
        }

        // Lazily-created account: missing row is balance 0.
        let mut account = self.db.get_account(account_id)?.unwrap_or_default();
        let resulting_balance =
            if is_debit { account.debit(amount)? } else { account.credit(amount)? };

        let entry_id = self.next_id();
        let entry = LedgerEntry {
            entry_id,
            account_id,
            delta: if is_debit { -(amount as i64) } else { amount as i64 },
            idempotency_key: idempotency_key.to_string(),
            reason,
            timestamp_ms: as_of_ms,
            resulting_balance,
        };

        let mut batch = sled::Batch::default();
        LedgerDb::batch_put_account(&mut batch, account_id, &account)?;
        LedgerDb::batch_put_entry(&mut batch, &entry)?;
        let granted_pack = stage(&mut batch)?;
        let rec = IdempotencyRecord {
            account_id,
            entry_id,
            resulting_balance,
            applied_at_ms: as_of_ms,
            granted_pack,
        };
        LedgerDb::batch_put_idempotency(&mut batch, idempotency_key, &rec)?;
        self.db.apply(batch)?;

        self.idem_cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record(idempotency_key, rec);

        Ok(MutationOutcome { entry_id, resulting_balance, duplicate: false, granted_pack })
    }

    /// Current balance; 0 for an account with no history.
    pub fn get_balance(&self, account_id: AccountId) -> Result<u64, LedgerError> {
        Ok(self.db.get_account(account_id)?.map(|a| a.balance).unwrap_or(0))
    }

    pub fn get_account(&self, account_id: AccountId) -> Result<Option<Account>, LedgerError> {
        self.db.get_account(account_id)
    }

    /// Recompute the entry-log sum and compare it to the stored balance.
    /// A mismatch is fatal to the caller's operation, never auto-corrected.
    pub fn verify_account(&self, account_id: AccountId) -> Result<u64, LedgerError> {
        let stored = self.get_balance(account_id)?;
        let mut sum: i64 = 0;
        for entry in self.db.entries_for_account(account_id) {
            sum += entry?.delta;
        }
        if sum < 0 || sum as u64 != stored {
            log::error!(
                "ledger invariant broken: account={} stored={} entry_sum={}",
                account_id,
                stored,
                sum
            );
            return Err(LedgerError::InvariantViolation(format!(
                "account {}: stored balance {} != entry sum {}",
                account_id, stored, sum
            )));
        }
        Ok(stored)
    }

    /// Drop durable idempotency records older than `before_ms`.
    pub fn gc_idempotency(&self, before_ms: i64) -> Result<usize, LedgerError> {
        let removed = self.db.gc_idempotency(before_ms)?;
        if removed > 0 {
            log::info!("idempotency gc: removed {} records before {}", removed, before_ms);
        }
        Ok(removed)
    }

    fn lookup_idempotency(&self, key: &str) -> Result<Option<IdempotencyRecord>, LedgerError> {
        if let Some(rec) = self.idem_cache.lock().unwrap_or_else(|e| e.into_inner()).lookup(key) {
            return Ok(Some(rec));
        }
        self.db.get_idempotency(key)
    }

    fn next_id(&self) -> u64 {
        self.ids.lock().unwrap_or_else(|e| e.into_inner()).generate()
    }
}
