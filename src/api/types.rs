use serde::{Deserialize, Serialize};

use crate::models::allowance::AllowanceSnapshot;
use crate::models::api_response::ApiResponse;

pub mod error_codes {
    pub const INVALID_INPUT: &str = "INVALID_INPUT";
    pub const INSUFFICIENT_BALANCE: &str = "INSUFFICIENT_BALANCE";
    pub const NO_SPINS_AVAILABLE: &str = "NO_SPINS_AVAILABLE";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const STORAGE_FAILURE: &str = "STORAGE_FAILURE";
    pub const INVARIANT_VIOLATION: &str = "INVARIANT_VIOLATION";
}

/// Credit/Debit request. `reason` uses the ledger's enumerated strings
/// (purchase, promo_grant, spin_pack_purchase, refund, adjustment).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceMutationRequest {
    pub account_id: u64,
    pub amount: u64,
    pub idempotency_key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantPackRequest {
    pub account_id: u64,
    pub spins_granted: u32,
    pub ttl_ms: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceMutationData {
    pub entry_id: String,
    pub resulting_balance: u64,
    pub duplicate: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceData {
    pub account_id: u64,
    pub balance: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActivePackData {
    pub pack_id: String,
    pub remaining: u32,
    pub expires_at_ms: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GrantPackData {
    pub pack_id: String,
    pub spins_granted: u32,
    pub expires_at_ms: i64,
}

/// Snapshot shape shared by GetAvailableSpins and ConsumeSpin.
#[derive(Debug, Serialize, Deserialize)]
pub struct AvailableSpinsData {
    pub base_spins: u32,
    pub bonus_spins: u32,
    pub total_spins: u32,
    pub spins_used: u32,
    pub spins_remaining: u32,
    pub has_spin_pack: bool,
    pub active_packs: Vec<ActivePackData>,
    pub message: String,
}

impl AvailableSpinsData {
    pub fn from_snapshot(snap: &AllowanceSnapshot) -> Self {
        let message = match snap.spins_remaining {
            0 => "No spins available".to_string(),
            1 => "1 spin remaining".to_string(),
            n => format!("{} spins remaining", n),
        };
        Self {
            base_spins: snap.base_spins,
            bonus_spins: snap.bonus_spins,
            total_spins: snap.total_spins,
            spins_used: snap.spins_used,
            spins_remaining: snap.spins_remaining,
            has_spin_pack: snap.has_spin_pack,
            active_packs: snap
                .active_packs
                .iter()
                .map(|p| ActivePackData {
                    pack_id: p.pack_id.to_string(),
                    remaining: p.remaining,
                    expires_at_ms: p.expires_at_ms,
                })
                .collect(),
            message,
        }
    }
}

/// Create success response
pub fn success_response<T>(data: T) -> ApiResponse<Option<T>> {
    ApiResponse::success(Some(data))
}

/// Create error response
pub fn error_response<T>(code: &str, message: String) -> ApiResponse<Option<T>> {
    ApiResponse::error(-1, format!("{}: {}", code, message), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::allowance::ActivePackView;

    #[test]
    fn test_snapshot_message() {
        let snap = AllowanceSnapshot {
            base_spins: 3,
            bonus_spins: 2,
            total_spins: 5,
            spins_used: 5,
            spins_remaining: 0,
            has_spin_pack: true,
            active_packs: vec![ActivePackView { pack_id: 9, remaining: 2, expires_at_ms: 100 }],
        };
        let data = AvailableSpinsData::from_snapshot(&snap);
        assert_eq!(data.message, "No spins available");
        assert_eq!(data.active_packs[0].pack_id, "9");
    }

    #[test]
    fn test_error_response_prefixes_code() {
        let resp: ApiResponse<Option<BalanceData>> =
            error_response(error_codes::NOT_FOUND, "account 5".to_string());
        assert_eq!(resp.status, -1);
        assert_eq!(resp.msg, "NOT_FOUND: account 5");
        assert!(resp.data.is_none());
    }
}
