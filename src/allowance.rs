//! AllowanceCalculator - the read side of "how many spins do I have".
//!
//! Pure composition over the business policy, the pack registry, and the
//! day's pool. Never mutates anything; a missing pool row is simply zero
//! consumption so far.

use std::sync::Arc;

use crate::common_utils::day_key;
use crate::models::account::{AccountId, BusinessId};
use crate::models::allowance::{ActivePackView, AllowanceSnapshot};
use crate::models::errors::LedgerError;
use crate::pack_registry::PackRegistry;
use crate::policy::BusinessPolicy;
use crate::store::LedgerDb;

pub struct AllowanceCalculator {
    db: Arc<LedgerDb>,
    packs: Arc<PackRegistry>,
    policy: Arc<dyn BusinessPolicy>,
}

impl AllowanceCalculator {
    pub fn new(
        db: Arc<LedgerDb>,
        packs: Arc<PackRegistry>,
        policy: Arc<dyn BusinessPolicy>,
    ) -> Self {
        Self { db, packs, policy }
    }

    pub fn get_available(
        &self,
        account_id: AccountId,
        business_id: BusinessId,
        as_of_ms: i64,
    ) -> Result<AllowanceSnapshot, LedgerError> {
        let base_spins = self.policy.base_spins(business_id);
        let day = day_key(as_of_ms, self.policy.utc_offset_minutes(business_id));

        let active = self.packs.active_packs(account_id, as_of_ms)?;
        let bonus_spins: u32 = active.iter().map(|p| p.remaining()).sum();

        let spins_used = self
            .db
            .get_pool(account_id, business_id, day)?
            .map(|p| p.spins_used)
            .unwrap_or(0);

        let total_spins = base_spins + bonus_spins;
        let spins_remaining = total_spins.saturating_sub(spins_used);

        Ok(AllowanceSnapshot {
            base_spins,
            bonus_spins,
            total_spins,
            spins_used,
            spins_remaining,
            has_spin_pack: !active.is_empty(),
            active_packs: active
                .iter()
                .map(|p| ActivePackView {
                    pack_id: p.pack_id,
                    remaining: p.remaining(),
                    expires_at_ms: p.expires_at_ms,
                })
                .collect(),
        })
    }
}
