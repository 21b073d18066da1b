use serde::{Deserialize, Serialize};

use crate::models::account::{AccountId, BusinessId};
use crate::models::bonus_pack::PackId;

/// Day-scoped consumption counter for one account at one business.
/// Superseded (not deleted) by the next day's pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowancePool {
    pub account_id: AccountId,
    pub business_id: BusinessId,
    pub day_key: i32,
    pub base_spins: u32,
    pub spins_used: u32,
}

impl AllowancePool {
    pub fn new(
        account_id: AccountId,
        business_id: BusinessId,
        day_key: i32,
        base_spins: u32,
    ) -> Self {
        Self { account_id, business_id, day_key, base_spins, spins_used: 0 }
    }
}

/// Per-pack remaining capacity for client display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivePackView {
    pub pack_id: PackId,
    pub remaining: u32,
    pub expires_at_ms: i64,
}

/// Point-in-time availability, returned by reads and after consumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowanceSnapshot {
    pub base_spins: u32,
    pub bonus_spins: u32,
    pub total_spins: u32,
    pub spins_used: u32,
    pub spins_remaining: u32,
    pub has_spin_pack: bool,
    pub active_packs: Vec<ActivePackView>,
}

/// Append-only record of one successful spin consumption, interleaved with
/// ledger entries by the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumptionEvent {
    pub event_id: u64,
    pub account_id: AccountId,
    pub business_id: BusinessId,
    pub day_key: i32,
    pub timestamp_ms: i64,
    /// Pack the spin was drawn from; None when base capacity covered it.
    pub drew_pack: Option<PackId>,
    pub spins_used_after: u32,
}
