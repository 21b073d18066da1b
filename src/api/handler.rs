// Collaborator-facing handlers for the rewards ledger.
//
// Flow for a mutating call:
// 1. Validate request (nothing committed on rejection)
// 2. Run the core operation under its lock
// 3. Map domain failures to code-prefixed error responses
//
// Expected outcomes (no spins, insufficient balance) come back as error
// responses the presentation layer can show; STORAGE_FAILURE is the only
// code callers should retry with backoff.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::allowance::AllowanceCalculator;
use crate::api::types::{
    error_codes, error_response, success_response, AvailableSpinsData, BalanceData,
    BalanceMutationData, BalanceMutationRequest, GrantPackData, GrantPackRequest,
};
use crate::api::validator::{
    validate_grant_request, validate_identity, validate_mutation_request,
};
use crate::audit_log::AuditLog;
use crate::common_utils::get_current_timestamp_ms;
use crate::configure::AppConfig;
use crate::consumption_guard::ConsumptionGuard;
use crate::ledger_store::LedgerStore;
use crate::models::api_response::ApiResponse;
use crate::models::errors::LedgerError;
use crate::pack_registry::{EntitlementLocks, PackRegistry};
use crate::policy::{BusinessPolicy, StaticPolicy};
use crate::store::LedgerDb;

/// Handler state: the wired engine. Cheap to share across request threads.
pub struct RewardsHandler {
    pub store: Arc<LedgerStore>,
    pub packs: Arc<PackRegistry>,
    pub calc: Arc<AllowanceCalculator>,
    pub guard: Arc<ConsumptionGuard>,
    pub audit: Arc<AuditLog>,
}

impl RewardsHandler {
    pub fn open(cfg: &AppConfig) -> Result<Self> {
        let policy = Arc::new(StaticPolicy::from_config(cfg));
        Self::open_at(Path::new(&cfg.data_dir), policy, cfg.idempotency_cache_size)
    }

    pub fn open_at(
        path: &Path,
        policy: Arc<dyn BusinessPolicy>,
        idem_cache_size: usize,
    ) -> Result<Self> {
        let db = Arc::new(LedgerDb::open(path)?);
        let locks = Arc::new(EntitlementLocks::new());
        let store = Arc::new(LedgerStore::new(db.clone(), idem_cache_size));
        let packs = Arc::new(PackRegistry::new(db.clone(), locks.clone()));
        let calc = Arc::new(AllowanceCalculator::new(db.clone(), packs.clone(), policy.clone()));
        let guard = Arc::new(ConsumptionGuard::new(
            db.clone(),
            packs.clone(),
            calc.clone(),
            policy,
            locks,
        ));
        let audit = Arc::new(AuditLog::new(db));
        Ok(Self { store, packs, calc, guard, audit })
    }

    pub fn get_available_spins(
        &self,
        user_id: u64,
        business_id: u64,
    ) -> Result<ApiResponse<Option<AvailableSpinsData>>> {
        if let Err(e) = validate_identity(user_id, business_id) {
            return Ok(error_response(error_codes::INVALID_INPUT, e.to_string()));
        }
        match self.calc.get_available(user_id, business_id, get_current_timestamp_ms()) {
            Ok(snap) => Ok(success_response(AvailableSpinsData::from_snapshot(&snap))),
            Err(e) => Ok(domain_error(e)),
        }
    }

    pub fn consume_spin(
        &self,
        user_id: u64,
        business_id: u64,
    ) -> Result<ApiResponse<Option<AvailableSpinsData>>> {
        if let Err(e) = validate_identity(user_id, business_id) {
            return Ok(error_response(error_codes::INVALID_INPUT, e.to_string()));
        }
        match self.guard.consume_spin(user_id, business_id, get_current_timestamp_ms()) {
            Ok(snap) => Ok(success_response(AvailableSpinsData::from_snapshot(&snap))),
            Err(e) => Ok(domain_error(e)),
        }
    }

    pub fn get_balance(&self, user_id: u64) -> Result<ApiResponse<Option<BalanceData>>> {
        match self.store.get_balance(user_id) {
            Ok(balance) => Ok(success_response(BalanceData { account_id: user_id, balance })),
            Err(e) => Ok(domain_error(e)),
        }
    }

    pub fn credit(
        &self,
        req: BalanceMutationRequest,
    ) -> Result<ApiResponse<Option<BalanceMutationData>>> {
        let reason = match validate_mutation_request(&req) {
            Ok(r) => r,
            Err(e) => return Ok(error_response(error_codes::INVALID_INPUT, e.to_string())),
        };
        let result = self.store.credit(
            req.account_id,
            req.amount,
            &req.idempotency_key,
            reason,
            get_current_timestamp_ms(),
        );
        Ok(mutation_response(result))
    }

    pub fn debit(
        &self,
        req: BalanceMutationRequest,
    ) -> Result<ApiResponse<Option<BalanceMutationData>>> {
        let reason = match validate_mutation_request(&req) {
            Ok(r) => r,
            Err(e) => return Ok(error_response(error_codes::INVALID_INPUT, e.to_string())),
        };
        let result = self.store.debit(
            req.account_id,
            req.amount,
            &req.idempotency_key,
            reason,
            get_current_timestamp_ms(),
        );
        Ok(mutation_response(result))
    }

    pub fn grant_pack(
        &self,
        req: GrantPackRequest,
    ) -> Result<ApiResponse<Option<GrantPackData>>> {
        if let Err(e) = validate_grant_request(&req) {
            return Ok(error_response(error_codes::INVALID_INPUT, e.to_string()));
        }
        match self.packs.grant_pack(
            req.account_id,
            req.spins_granted,
            req.ttl_ms,
            get_current_timestamp_ms(),
        ) {
            Ok(pack) => Ok(success_response(GrantPackData {
                pack_id: pack.pack_id.to_string(),
                spins_granted: pack.spins_granted,
                expires_at_ms: pack.expires_at_ms,
            })),
            Err(e) => Ok(domain_error(e)),
        }
    }
}

fn mutation_response(
    result: Result<crate::ledger_store::MutationOutcome, LedgerError>,
) -> ApiResponse<Option<BalanceMutationData>> {
    match result {
        Ok(outcome) => success_response(BalanceMutationData {
            entry_id: outcome.entry_id.to_string(),
            resulting_balance: outcome.resulting_balance,
            duplicate: outcome.duplicate,
        }),
        Err(e) => domain_error(e),
    }
}

fn domain_error<T>(err: LedgerError) -> ApiResponse<Option<T>> {
    if err.is_retryable() {
        log::warn!("retryable failure surfaced to caller: {}", err);
    }
    error_response(err.error_code(), err.to_string())
}
