use serde::{Deserialize, Serialize};

use crate::models::account::AccountId;

pub type EntryId = u64;

/// Why a balance moved. Stored on every entry for dispute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryReason {
    Purchase,
    PromoGrant,
    SpinPackPurchase,
    Refund,
    Adjustment,
}

impl EntryReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::PromoGrant => "promo_grant",
            Self::SpinPackPurchase => "spin_pack_purchase",
            Self::Refund => "refund",
            Self::Adjustment => "adjustment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "purchase" => Some(Self::Purchase),
            "promo_grant" => Some(Self::PromoGrant),
            "spin_pack_purchase" => Some(Self::SpinPackPurchase),
            "refund" => Some(Self::Refund),
            "adjustment" => Some(Self::Adjustment),
            _ => None,
        }
    }
}

/// One immutable, append-only balance mutation. The sum of `delta` over an
/// account's entries must equal its stored balance at every point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: EntryId,
    pub account_id: AccountId,
    pub delta: i64,
    pub idempotency_key: String,
    pub reason: EntryReason,
    pub timestamp_ms: i64,
    pub resulting_balance: u64,
}
