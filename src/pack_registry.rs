//! Bonus pack registry: grants, active-pack lookup, expiry sweep.
//!
//! Packs are account-scoped and shared by every business's allowance, so all
//! entitlement mutation (grants here, decrements in the consumption guard)
//! serializes on one per-account lock.

use std::sync::{Arc, Mutex};

use crate::common_utils::MS_PER_HOUR;
use crate::id_gen::TimeOrderedIdGen;
use crate::ledger_store::LedgerStore;
use crate::models::account::AccountId;
use crate::models::bonus_pack::{BonusPack, PackId, PackStatus};
use crate::models::errors::LedgerError;
use crate::models::ledger_entry::EntryReason;
use crate::store::{LedgerDb, LockTable};

/// Shared per-account critical section for pack and pool mutation.
pub type EntitlementLocks = LockTable<AccountId>;

pub struct PackRegistry {
    db: Arc<LedgerDb>,
    locks: Arc<EntitlementLocks>,
    ids: Mutex<TimeOrderedIdGen>,
}

impl PackRegistry {
    pub fn new(db: Arc<LedgerDb>, locks: Arc<EntitlementLocks>) -> Self {
        Self { db, locks, ids: Mutex::new(TimeOrderedIdGen::new()) }
    }

    /// Grant a pack of `spins_granted` spins valid for `ttl_ms` from now.
    pub fn grant_pack(
        &self,
        account_id: AccountId,
        spins_granted: u32,
        ttl_ms: i64,
        as_of_ms: i64,
    ) -> Result<BonusPack, LedgerError> {
        if spins_granted == 0 {
            return Err(LedgerError::InvalidInput("spins_granted must be positive".to_string()));
        }
        if ttl_ms <= 0 {
            return Err(LedgerError::InvalidInput("ttl must be positive".to_string()));
        }

        let lock = self.locks.acquire(account_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let pack = BonusPack {
            pack_id: self.next_id(),
            account_id,
            granted_at_ms: as_of_ms,
            expires_at_ms: as_of_ms + ttl_ms,
            spins_granted,
            spins_consumed: 0,
            status: PackStatus::Active,
        };

        let mut batch = sled::Batch::default();
        LedgerDb::batch_put_pack(&mut batch, &pack)?;
        self.db.apply(batch)?;

        log::info!(
            "granted pack {}: account={} spins={} expires_at={}",
            pack.pack_id,
            account_id,
            spins_granted,
            pack.expires_at_ms
        );
        Ok(pack)
    }

    /// Purchase flow: the debit, its ledger entry, the idempotency record
    /// and the pack commit in one batch, so the price is never taken without
    /// the grant landing. A replayed key returns the originally granted pack.
    pub fn purchase_pack(
        &self,
        store: &LedgerStore,
        account_id: AccountId,
        spins_granted: u32,
        ttl_ms: i64,
        price: u64,
        idempotency_key: &str,
        as_of_ms: i64,
    ) -> Result<BonusPack, LedgerError> {
        if spins_granted == 0 {
            return Err(LedgerError::InvalidInput("spins_granted must be positive".to_string()));
        }
        if ttl_ms <= 0 {
            return Err(LedgerError::InvalidInput("ttl must be positive".to_string()));
        }

        // Entitlement lock first, then the ledger's account lock inside
        // debit_with. No path takes them in the other order.
        let lock = self.locks.acquire(account_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let pack = BonusPack {
            pack_id: self.next_id(),
            account_id,
            granted_at_ms: as_of_ms,
            expires_at_ms: as_of_ms + ttl_ms,
            spins_granted,
            spins_consumed: 0,
            status: PackStatus::Active,
        };

        let outcome = store.debit_with(
            account_id,
            price,
            idempotency_key,
            EntryReason::SpinPackPurchase,
            as_of_ms,
            |batch| {
                LedgerDb::batch_put_pack(batch, &pack)?;
                Ok(Some(pack.pack_id))
            },
        )?;

        if outcome.duplicate {
            let pack_id = outcome.granted_pack.ok_or_else(|| {
                LedgerError::InvalidInput(format!(
                    "idempotency key '{}' was consumed by a non-purchase operation",
                    idempotency_key
                ))
            })?;
            let original = self.db.get_pack(account_id, pack_id)?.ok_or_else(|| {
                LedgerError::InvariantViolation(format!(
                    "purchase record for key '{}' names missing pack {}",
                    idempotency_key, pack_id
                ))
            })?;
            log::debug!(
                "pack purchase replay: account={} key={} pack={}",
                account_id,
                idempotency_key,
                pack_id
            );
            return Ok(original);
        }

        log::info!(
            "purchased pack {}: account={} spins={} price={}",
            pack.pack_id,
            account_id,
            spins_granted,
            price
        );
        Ok(pack)
    }

    /// Packs usable at `as_of_ms`, soonest-expiring first. Consumption must
    /// draw from the head to minimize entitlement waste. Expiry is decided
    /// here from timestamps, never from the cached status.
    pub fn active_packs(
        &self,
        account_id: AccountId,
        as_of_ms: i64,
    ) -> Result<Vec<BonusPack>, LedgerError> {
        let mut packs: Vec<BonusPack> = self
            .db
            .packs_for_account(account_id)?
            .into_iter()
            .filter(|p| p.is_active(as_of_ms))
            .collect();
        packs.sort_by_key(|p| (p.expires_at_ms, p.pack_id));
        Ok(packs)
    }

    pub fn get_pack(
        &self,
        account_id: AccountId,
        pack_id: PackId,
    ) -> Result<Option<BonusPack>, LedgerError> {
        self.db.get_pack(account_id, pack_id)
    }

    /// Refresh the cached status of packs whose state is stale. Purely an
    /// optimization: reads derive status from timestamps, so running this
    /// zero or many times, concurrently with live traffic, is safe.
    pub fn expire_sweep(&self, as_of_ms: i64) -> Result<usize, LedgerError> {
        let mut updated = 0usize;
        let stale: Vec<BonusPack> = self
            .db
            .all_packs()
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|p| p.status != p.status_at(as_of_ms))
            .collect();

        for mut pack in stale {
            let lock = self.locks.acquire(pack.account_id);
            let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

            // Re-read under the lock; a consume may have landed meanwhile.
            let Some(current) = self.db.get_pack(pack.account_id, pack.pack_id)? else {
                continue;
            };
            pack = current;
            let derived = pack.status_at(as_of_ms);
            if pack.status == derived {
                continue;
            }
            pack.status = derived;

            let mut batch = sled::Batch::default();
            LedgerDb::batch_put_pack(&mut batch, &pack)?;
            self.db.apply(batch)?;
            updated += 1;
        }

        if updated > 0 {
            log::debug!("expire sweep: refreshed {} pack statuses", updated);
        }
        Ok(updated)
    }

    fn next_id(&self) -> u64 {
        self.ids.lock().unwrap_or_else(|e| e.into_inner()).generate()
    }
}

/// Convenience for grant callers configured in hours.
pub fn hours_to_ms(hours: i64) -> i64 {
    hours * MS_PER_HOUR
}
