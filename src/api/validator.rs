use anyhow::{bail, Result};

use crate::api::types::{error_codes, BalanceMutationRequest, GrantPackRequest};
use crate::models::ledger_entry::EntryReason;

/// Validate a credit/debit request before any state change.
pub fn validate_mutation_request(req: &BalanceMutationRequest) -> Result<EntryReason> {
    if req.account_id == 0 {
        bail!("{}: account_id must be non-zero", error_codes::INVALID_INPUT);
    }

    if req.amount == 0 {
        bail!("{}: amount must be positive", error_codes::INVALID_INPUT);
    }

    if req.idempotency_key.trim().is_empty() {
        bail!("{}: idempotency_key must not be empty", error_codes::INVALID_INPUT);
    }

    match EntryReason::parse(&req.reason) {
        Some(reason) => Ok(reason),
        None => bail!("{}: unknown reason '{}'", error_codes::INVALID_INPUT, req.reason),
    }
}

/// Validate a pack grant request.
pub fn validate_grant_request(req: &GrantPackRequest) -> Result<()> {
    if req.account_id == 0 {
        bail!("{}: account_id must be non-zero", error_codes::INVALID_INPUT);
    }
    if req.spins_granted == 0 {
        bail!("{}: spins_granted must be positive", error_codes::INVALID_INPUT);
    }
    if req.ttl_ms <= 0 {
        bail!("{}: ttl must be positive", error_codes::INVALID_INPUT);
    }
    Ok(())
}

/// Validate the pre-authorized identity pair attached to spin calls.
pub fn validate_identity(user_id: u64, business_id: u64) -> Result<()> {
    if user_id == 0 {
        bail!("{}: user_id must be non-zero", error_codes::INVALID_INPUT);
    }
    if business_id == 0 {
        bail!("{}: business_id must be non-zero", error_codes::INVALID_INPUT);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> BalanceMutationRequest {
        BalanceMutationRequest {
            account_id: 1,
            amount: 100,
            idempotency_key: "promo-1".to_string(),
            reason: "promo_grant".to_string(),
        }
    }

    #[test]
    fn test_valid_mutation() {
        assert_eq!(validate_mutation_request(&req()).unwrap(), EntryReason::PromoGrant);
    }

    #[test]
    fn test_rejects_zero_amount() {
        let mut r = req();
        r.amount = 0;
        let err = validate_mutation_request(&r).unwrap_err();
        assert!(err.to_string().starts_with(error_codes::INVALID_INPUT));
    }

    #[test]
    fn test_rejects_blank_key() {
        let mut r = req();
        r.idempotency_key = "  ".to_string();
        assert!(validate_mutation_request(&r).is_err());
    }

    #[test]
    fn test_rejects_unknown_reason() {
        let mut r = req();
        r.reason = "jackpot".to_string();
        assert!(validate_mutation_request(&r).is_err());
    }

    #[test]
    fn test_grant_ttl_must_be_positive() {
        let r = GrantPackRequest { account_id: 1, spins_granted: 5, ttl_ms: 0 };
        assert!(validate_grant_request(&r).is_err());
    }
}
