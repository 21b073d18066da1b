use serde::{Deserialize, Serialize};

use crate::models::account::AccountId;
use crate::models::errors::LedgerError;

pub type PackId = u64;

/// Cached lifecycle state, refreshed by the expiry sweep. Reads never trust
/// this alone; `status_at` derives the authoritative state from timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackStatus {
    Active,
    Exhausted,
    Expired,
}

/// A time-boxed grant of extra spins beyond the base allotment.
/// Never physically deleted; retained for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BonusPack {
    pub pack_id: PackId,
    pub account_id: AccountId,
    pub granted_at_ms: i64,
    pub expires_at_ms: i64,
    pub spins_granted: u32,
    pub spins_consumed: u32,
    pub status: PackStatus,
}

impl BonusPack {
    pub fn remaining(&self) -> u32 {
        self.spins_granted.saturating_sub(self.spins_consumed)
    }

    /// Expiry takes precedence; exhaustion only applies before `expires_at`.
    pub fn status_at(&self, as_of_ms: i64) -> PackStatus {
        if as_of_ms >= self.expires_at_ms {
            PackStatus::Expired
        } else if self.spins_consumed >= self.spins_granted {
            PackStatus::Exhausted
        } else {
            PackStatus::Active
        }
    }

    pub fn is_active(&self, as_of_ms: i64) -> bool {
        as_of_ms >= self.granted_at_ms && self.status_at(as_of_ms) == PackStatus::Active
    }

    pub fn consume_one(&mut self) -> Result<(), LedgerError> {
        if self.spins_consumed >= self.spins_granted {
            return Err(LedgerError::InvariantViolation(format!(
                "pack {} over-consumed: {}/{}",
                self.pack_id, self.spins_consumed, self.spins_granted
            )));
        }
        self.spins_consumed += 1;
        Ok(())
    }
}
