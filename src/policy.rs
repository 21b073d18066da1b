//! Business policy collaborator: base spin allotments per business and the
//! business-local day boundary. Owned by external configuration, consumed
//! read-only by the allowance calculator.

use std::collections::HashMap;

use crate::configure::AppConfig;
use crate::models::account::BusinessId;

pub trait BusinessPolicy: Send + Sync {
    fn base_spins(&self, business_id: BusinessId) -> u32;
    fn utc_offset_minutes(&self, business_id: BusinessId) -> i32;
}

/// Config-backed policy: one default allotment plus per-business overrides.
pub struct StaticPolicy {
    default_base_spins: u32,
    utc_offset_minutes: i32,
    overrides: HashMap<BusinessId, u32>,
}

impl StaticPolicy {
    pub fn new(default_base_spins: u32, utc_offset_minutes: i32) -> Self {
        Self { default_base_spins, utc_offset_minutes, overrides: HashMap::new() }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(cfg.default_base_spins, cfg.business_utc_offset_minutes)
    }

    pub fn with_override(mut self, business_id: BusinessId, base_spins: u32) -> Self {
        self.overrides.insert(business_id, base_spins);
        self
    }
}

impl BusinessPolicy for StaticPolicy {
    fn base_spins(&self, business_id: BusinessId) -> u32 {
        self.overrides.get(&business_id).copied().unwrap_or(self.default_base_spins)
    }

    fn utc_offset_minutes(&self, _business_id: BusinessId) -> i32 {
        self.utc_offset_minutes
    }
}
