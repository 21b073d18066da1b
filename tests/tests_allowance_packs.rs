use std::sync::Arc;

use spinledger::api::handler::RewardsHandler;
use spinledger::common_utils::{MS_PER_DAY, MS_PER_HOUR};
use spinledger::models::bonus_pack::PackStatus;
use spinledger::models::errors::LedgerError;
use spinledger::models::ledger_entry::EntryReason;
use spinledger::policy::StaticPolicy;

fn open_handler(base_spins: u32) -> (tempfile::TempDir, RewardsHandler) {
    let dir = tempfile::tempdir().expect("tempdir");
    let policy = Arc::new(StaticPolicy::new(base_spins, 0));
    let handler = RewardsHandler::open_at(dir.path(), policy, 1024).expect("open");
    (dir, handler)
}

const T0: i64 = 1_700_000_000_000;

#[test]
fn test_grant_validation() {
    let (_dir, h) = open_handler(3);
    assert!(matches!(
        h.packs.grant_pack(1, 0, MS_PER_HOUR, T0),
        Err(LedgerError::InvalidInput(_))
    ));
    assert!(matches!(h.packs.grant_pack(1, 5, 0, T0), Err(LedgerError::InvalidInput(_))));
    assert!(matches!(h.packs.grant_pack(1, 5, -1, T0), Err(LedgerError::InvalidInput(_))));
}

// Scenario A: base 3, no packs.
#[test]
fn test_base_allowance_exhausts() {
    let (_dir, h) = open_handler(3);
    for i in 0..3 {
        let snap = h.guard.consume_spin(1, 10, T0 + i).unwrap();
        assert_eq!(snap.spins_used, (i + 1) as u32);
    }
    let err = h.guard.consume_spin(1, 10, T0 + 3).unwrap_err();
    assert_eq!(err, LedgerError::NoSpinsAvailable { spins_used: 3, total_spins: 3 });

    let snap = h.calc.get_available(1, 10, T0 + 4).unwrap();
    assert_eq!(snap.spins_used, 3);
    assert_eq!(snap.spins_remaining, 0);
}

// Scenario B: a 5-spin pack with 1h ttl counts immediately and stops
// counting at expiry even though no sweep ever ran.
#[test]
fn test_pack_expiry_is_lazy() {
    let (_dir, h) = open_handler(3);
    h.packs.grant_pack(1, 5, MS_PER_HOUR, T0).unwrap();

    let snap = h.calc.get_available(1, 10, T0).unwrap();
    assert_eq!(snap.total_spins, 8);
    assert_eq!(snap.bonus_spins, 5);
    assert!(snap.has_spin_pack);

    let snap = h.calc.get_available(1, 10, T0 + MS_PER_HOUR).unwrap();
    assert_eq!(snap.total_spins, 3);
    assert_eq!(snap.bonus_spins, 0);
    assert!(!snap.has_spin_pack);
    assert!(snap.active_packs.is_empty());
}

#[test]
fn test_consumption_draws_soonest_expiring_pack() {
    let (_dir, h) = open_handler(0);
    let late = h.packs.grant_pack(1, 2, 10 * MS_PER_HOUR, T0).unwrap();
    let soon = h.packs.grant_pack(1, 2, MS_PER_HOUR, T0).unwrap();

    // Ordering is expiry-ascending regardless of grant order
    let active = h.packs.active_packs(1, T0).unwrap();
    assert_eq!(active[0].pack_id, soon.pack_id);
    assert_eq!(active[1].pack_id, late.pack_id);

    let snap = h.guard.consume_spin(1, 10, T0).unwrap();
    // Bonus remaining shrank with the draw, so did total
    assert_eq!(snap.total_spins, 3);
    assert_eq!(snap.spins_used, 1);
    assert_eq!(snap.spins_remaining, 2);

    let soon_after = h.packs.get_pack(1, soon.pack_id).unwrap().unwrap();
    let late_after = h.packs.get_pack(1, late.pack_id).unwrap().unwrap();
    assert_eq!(soon_after.spins_consumed, 1);
    assert_eq!(late_after.spins_consumed, 0);

    // Second draw exhausts the soon pack; the late one is still untouched
    h.guard.consume_spin(1, 10, T0 + 1).unwrap();
    let soon_after = h.packs.get_pack(1, soon.pack_id).unwrap().unwrap();
    let late_after = h.packs.get_pack(1, late.pack_id).unwrap().unwrap();
    assert_eq!(soon_after.spins_consumed, 2);
    assert_eq!(late_after.spins_consumed, 0);
}

#[test]
fn test_base_consumption_never_touches_packs() {
    let (_dir, h) = open_handler(2);
    let pack = h.packs.grant_pack(1, 3, MS_PER_HOUR, T0).unwrap();

    h.guard.consume_spin(1, 10, T0).unwrap();
    h.guard.consume_spin(1, 10, T0 + 1).unwrap();

    let stored = h.packs.get_pack(1, pack.pack_id).unwrap().unwrap();
    assert_eq!(stored.spins_consumed, 0);

    // Third spin exceeds base capacity and draws the pack
    h.guard.consume_spin(1, 10, T0 + 2).unwrap();
    let stored = h.packs.get_pack(1, pack.pack_id).unwrap().unwrap();
    assert_eq!(stored.spins_consumed, 1);
}

#[test]
fn test_day_rollover_resets_usage() {
    let (_dir, h) = open_handler(1);
    h.guard.consume_spin(1, 10, T0).unwrap();
    assert!(h.guard.consume_spin(1, 10, T0 + 1).is_err());

    // Next business-local day: fresh pool, old one superseded
    let snap = h.guard.consume_spin(1, 10, T0 + MS_PER_DAY).unwrap();
    assert_eq!(snap.spins_used, 1);
}

#[test]
fn test_businesses_have_separate_pools() {
    let (_dir, h) = open_handler(1);
    h.guard.consume_spin(1, 10, T0).unwrap();
    // Different business, same account and day: its own pool
    let snap = h.guard.consume_spin(1, 11, T0).unwrap();
    assert_eq!(snap.spins_used, 1);
}

#[test]
fn test_expire_sweep_is_idempotent_and_non_authoritative() {
    let (_dir, h) = open_handler(3);
    let pack = h.packs.grant_pack(1, 5, MS_PER_HOUR, T0).unwrap();

    // Nothing stale yet
    assert_eq!(h.packs.expire_sweep(T0 + 1).unwrap(), 0);

    let after_expiry = T0 + MS_PER_HOUR + 1;
    assert_eq!(h.packs.expire_sweep(after_expiry).unwrap(), 1);
    // Second run is a no-op
    assert_eq!(h.packs.expire_sweep(after_expiry).unwrap(), 0);

    let stored = h.packs.get_pack(1, pack.pack_id).unwrap().unwrap();
    assert_eq!(stored.status, PackStatus::Expired);
    // Pack retained for audit, just no longer active
    assert!(h.packs.active_packs(1, after_expiry).unwrap().is_empty());
}

#[test]
fn test_purchase_pack_debits_once() {
    let (_dir, h) = open_handler(3);
    h.store.credit(1, 1_000, "seed", EntryReason::PromoGrant, T0).unwrap();

    let pack = h
        .packs
        .purchase_pack(&h.store, 1, 5, MS_PER_HOUR, 300, "buy-1", T0)
        .unwrap();
    assert_eq!(h.store.get_balance(1).unwrap(), 700);

    // Retried purchase: no second debit, no second pack, and the caller
    // gets the originally granted pack back rather than a dead end.
    let replay = h
        .packs
        .purchase_pack(&h.store, 1, 5, MS_PER_HOUR, 300, "buy-1", T0 + 1)
        .unwrap();
    assert_eq!(replay.pack_id, pack.pack_id);
    assert_eq!(h.store.get_balance(1).unwrap(), 700);
    assert_eq!(h.packs.active_packs(1, T0 + 2).unwrap().len(), 1);

    // The grant committed with the debit: the pack is usable immediately
    let snap = h.calc.get_available(1, 10, T0 + 2).unwrap();
    assert_eq!(snap.bonus_spins, 5);
}

// A purchase key consumed by a non-purchase debit is a client bug; it must
// fail loudly instead of quietly dropping the grant.
#[test]
fn test_purchase_rejects_key_consumed_by_plain_debit() {
    let (_dir, h) = open_handler(3);
    h.store.credit(1, 1_000, "seed", EntryReason::PromoGrant, T0).unwrap();
    h.store.debit(1, 300, "buy-1", EntryReason::Purchase, T0).unwrap();

    let err = h
        .packs
        .purchase_pack(&h.store, 1, 5, MS_PER_HOUR, 300, "buy-1", T0 + 1)
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput(_)));
    assert_eq!(h.store.get_balance(1).unwrap(), 700);
    assert!(h.packs.active_packs(1, T0 + 1).unwrap().is_empty());
}

#[test]
fn test_purchase_pack_requires_funds() {
    let (_dir, h) = open_handler(3);
    h.store.credit(1, 100, "seed", EntryReason::PromoGrant, T0).unwrap();

    let err = h
        .packs
        .purchase_pack(&h.store, 1, 5, MS_PER_HOUR, 300, "buy-1", T0)
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
    assert_eq!(h.store.get_balance(1).unwrap(), 100);
    assert!(h.packs.active_packs(1, T0).unwrap().is_empty());
}
