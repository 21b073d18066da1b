//! ConsumptionGuard - the single atomic gate for spending a spin.
//!
//! Recompute availability, decide, and commit pool + pack + event in one
//! batch, all under the account's entitlement lock. N concurrent calls
//! against an allowance of K never let more than K through.

use std::sync::{Arc, Mutex};

use crate::allowance::AllowanceCalculator;
use crate::common_utils::day_key;
use crate::id_gen::TimeOrderedIdGen;
use crate::models::account::{AccountId, BusinessId};
use crate::models::allowance::{AllowancePool, AllowanceSnapshot, ConsumptionEvent};
use crate::models::errors::LedgerError;
use crate::pack_registry::{EntitlementLocks, PackRegistry};
use crate::policy::BusinessPolicy;
use crate::store::LedgerDb;

pub struct ConsumptionGuard {
    db: Arc<LedgerDb>,
    packs: Arc<PackRegistry>,
    calc: Arc<AllowanceCalculator>,
    policy: Arc<dyn BusinessPolicy>,
    locks: Arc<EntitlementLocks>,
    ids: Mutex<TimeOrderedIdGen>,
}

impl ConsumptionGuard {
    pub fn new(
        db: Arc<LedgerDb>,
        packs: Arc<PackRegistry>,
        calc: Arc<AllowanceCalculator>,
        policy: Arc<dyn BusinessPolicy>,
        locks: Arc<EntitlementLocks>,
    ) -> Self {
        Self { db, packs, calc, policy, locks, ids: Mutex::new(TimeOrderedIdGen::new()) }
    }

    /// Spend one spin. On success returns the post-consumption snapshot;
    /// `NoSpinsAvailable` commits nothing.
    pub fn consume_spin(
        &self,
        account_id: AccountId,
        business_id: BusinessId,
        as_of_ms: i64,
    ) -> Result<AllowanceSnapshot, LedgerError> {
        let lock = self.locks.acquire(account_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        // Availability must be re-derived inside the critical section; a
        // caller-supplied snapshot could be stale.
        let snapshot = self.calc.get_available(account_id, business_id, as_of_ms)?;
        if snapshot.spins_remaining < 1 {
            return Err(LedgerError::NoSpinsAvailable {
                spins_used: snapshot.spins_used,
                total_spins: snapshot.total_spins,
            });
        }

        let day = day_key(as_of_ms, self.policy.utc_offset_minutes(business_id));
        let mut pool = self
            .db
            .get_pool(account_id, business_id, day)?
            .unwrap_or_else(|| AllowancePool::new(account_id, business_id, day, snapshot.base_spins));
        pool.spins_used += 1;

        let mut batch = sled::Batch::default();

        // Past base capacity, the spin draws down the soonest-expiring pack.
        let mut drew_pack = None;
        if pool.spins_used > snapshot.base_spins {
            let mut active = self.packs.active_packs(account_id, as_of_ms)?;
            let pack = active.first_mut().ok_or_else(|| {
                LedgerError::InvariantViolation(format!(
                    "account {}: bonus consumption with no active pack",
                    account_id
                ))
            })?;
            pack.consume_one()?;
            drew_pack = Some(pack.pack_id);
            LedgerDb::batch_put_pack(&mut batch, pack)?;
        }

        let event = ConsumptionEvent {
            event_id: self.ids.lock().unwrap_or_else(|e| e.into_inner()).generate(),
            account_id,
            business_id,
            day_key: day,
            timestamp_ms: as_of_ms,
            drew_pack,
            spins_used_after: pool.spins_used,
        };

        LedgerDb::batch_put_pool(&mut batch, &pool)?;
        LedgerDb::batch_put_consumption(&mut batch, &event)?;
        self.db.apply(batch)?;

        log::debug!(
            "spin consumed: account={} business={} day={} used={} pack={:?}",
            account_id,
            business_id,
            day,
            pool.spins_used,
            drew_pack
        );

        self.calc.get_available(account_id, business_id, as_of_ms)
    }
}
