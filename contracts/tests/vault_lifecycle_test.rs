//! Integration tests for the stipend vault.
//!
//! These drive a vault through realistic sequences against the in-memory
//! ledger, custody and price feed: deposits from several parties, monthly
//! payouts across price moves, banked catch-up time, and emergency drains.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use stipend_contracts::config::{
    DAY_SECS, MIN_DEPOSIT, MIN_EMERGENCY_DELAY_SECS, WAD, WITHDRAW_DELAY_SECS,
};
use stipend_contracts::{
    Address, AssetCustody, CallContext, Collaborators, InMemoryCustody, InMemoryShareLedger,
    ManualPriceFeed, ShareLedger, Vault, VaultError, VaultEvent,
};

const VAULT: Address = Address::from_tag(0x01);
const ESCROW: Address = Address::from_tag(0x02);
const LEDGER: Address = Address::from_tag(0x03);
const HOLDER: Address = Address::from_tag(0x10);
const FRIEND: Address = Address::from_tag(0x20);

/// $2,000.00000000
const PRICE: i128 = 2_000_00000000;

struct Harness {
    vault: Vault,
    feed: Arc<ManualPriceFeed>,
    ledger: Arc<InMemoryShareLedger>,
    custody: Arc<InMemoryCustody>,
    t0: DateTime<Utc>,
}

/// Helper: a fresh vault deployed at 2026-01-01 with the price at $2,000.
fn harness() -> Harness {
    let feed = Arc::new(ManualPriceFeed::new(PRICE));
    let ledger = Arc::new(InMemoryShareLedger::new(LEDGER));
    let custody = Arc::new(InMemoryCustody::new());
    let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let vault = Vault::deploy(
        VAULT,
        HOLDER,
        t0,
        Collaborators {
            feed: feed.clone(),
            ledger: ledger.clone(),
            custody: custody.clone(),
            escrow_address: ESCROW,
        },
    )
    .unwrap();
    Harness {
        vault,
        feed,
        ledger,
        custody,
        t0,
    }
}

impl Harness {
    fn at(&self, caller: Address, secs: u64) -> CallContext {
        CallContext::new(caller, self.t0 + Duration::try_seconds(secs as i64).unwrap())
    }

    fn deposit_from(&self, from: Address, secs: u64, amount: u128) {
        let ctx = self.at(from, secs).with_value(amount);
        self.vault.deposit(&ctx, amount).unwrap();
    }

    fn assert_backed(&self) {
        assert_eq!(self.vault.deployed(), self.ledger.total_supply());
        assert_eq!(self.vault.deployed(), self.custody.balance());
    }
}

// ---------------------------------------------------------------------------
// Deposits
// ---------------------------------------------------------------------------

#[test]
fn deposits_from_anyone_credit_the_holder() {
    let h = harness();
    h.deposit_from(HOLDER, 0, WAD);
    h.deposit_from(FRIEND, 10, 2 * WAD);

    assert_eq!(h.ledger.balance_of(&HOLDER), 3 * WAD);
    assert_eq!(h.ledger.balance_of(&FRIEND), 0);
    assert_eq!(h.vault.monthly_pay_usd_e8(), 120_00000000);
    h.assert_backed();

    let events = h.vault.drain_events();
    assert_eq!(events.len(), 2);
    assert!(events
        .iter()
        .all(|e| matches!(e, VaultEvent::Deposit { holder, .. } if *holder == HOLDER)));
}

#[test]
fn deposits_price_each_tranche_at_its_own_price() {
    let h = harness();
    h.deposit_from(HOLDER, 0, WAD);
    h.feed.set(1_000_00000000);
    h.deposit_from(HOLDER, 10, WAD);
    // $40 from the first unit, $20 from the second.
    assert_eq!(h.vault.monthly_pay_usd_e8(), 60_00000000);
}

#[test]
fn minimum_deposit_is_inclusive() {
    let h = harness();
    let below = h.at(HOLDER, 0).with_value(MIN_DEPOSIT - 1);
    assert!(matches!(
        h.vault.deposit(&below, MIN_DEPOSIT - 1),
        Err(VaultError::InvalidAmount { .. })
    ));
    h.deposit_from(HOLDER, 0, MIN_DEPOSIT);
    assert_eq!(h.vault.deployed(), MIN_DEPOSIT);
}

#[test]
fn unavailable_feed_blocks_deposits() {
    let h = harness();
    h.feed.clear();
    let ctx = h.at(HOLDER, 0).with_value(WAD);
    assert!(matches!(
        h.vault.deposit(&ctx, WAD),
        Err(VaultError::Oracle(_))
    ));
    assert_eq!(h.vault.deployed(), 0);
    h.assert_backed();
}

// ---------------------------------------------------------------------------
// Monthly Payouts
// ---------------------------------------------------------------------------

#[test]
fn payout_tracks_usd_value_not_units() {
    let h = harness();
    h.deposit_from(HOLDER, 0, WAD);
    let monthly = h.vault.monthly_pay_usd_e8();

    // Price doubles: half the units, same dollars.
    h.feed.set(2 * PRICE);
    let first = h.vault.withdraw(&h.at(HOLDER, WITHDRAW_DELAY_SECS + 1)).unwrap();
    assert_eq!(first, WAD / 100);
    assert_eq!(first * (2 * PRICE as u128) / WAD, monthly);

    // Price halves: double the units, same dollars.
    h.feed.set(PRICE / 2);
    let second = h
        .vault
        .withdraw(&h.at(HOLDER, 2 * WITHDRAW_DELAY_SECS + 2))
        .unwrap();
    assert_eq!(second, WAD / 25);
    assert_eq!(second * (PRICE as u128 / 2) / WAD, monthly);

    assert_eq!(h.vault.monthly_pay_usd_e8(), monthly);
    assert_eq!(h.custody.paid_to(&HOLDER), first + second);
    h.assert_backed();
}

#[test]
fn payout_cadence_restarts_from_each_withdrawal() {
    let h = harness();
    h.deposit_from(HOLDER, 0, WAD);
    let first_at = WITHDRAW_DELAY_SECS + DAY_SECS;
    h.vault.withdraw(&h.at(HOLDER, first_at)).unwrap();

    let too_soon = h.at(HOLDER, first_at + WITHDRAW_DELAY_SECS);
    assert!(matches!(
        h.vault.withdraw(&too_soon),
        Err(VaultError::NotAvailable { .. })
    ));
    h.vault
        .withdraw(&h.at(HOLDER, first_at + WITHDRAW_DELAY_SECS + 1))
        .unwrap();
    assert_eq!(h.vault.catch_up_secs(), DAY_SECS + 1);
}

#[test]
fn next_withdrawal_view_matches_gate() {
    let h = harness();
    h.deposit_from(HOLDER, 0, WAD);
    let opens = h.vault.next_withdrawal_at().unwrap();
    assert_eq!(opens, h.at(HOLDER, WITHDRAW_DELAY_SECS).now);
    assert_eq!(h.vault.preview_payout().unwrap(), WAD / 50);
}

#[test]
fn missed_months_are_redeemed_through_catch_up() {
    let h = harness();
    h.deposit_from(HOLDER, 0, 10 * WAD);
    // Three months late, plus five seconds.
    let ctx = h.at(HOLDER, 3 * WITHDRAW_DELAY_SECS + 5);
    h.vault.withdraw(&ctx).unwrap();
    assert_eq!(h.vault.catch_up_secs(), 2 * WITHDRAW_DELAY_SECS + 5);

    h.vault.withdraw_catch_up(&ctx).unwrap();
    h.vault.withdraw_catch_up(&ctx).unwrap();
    assert_eq!(h.vault.catch_up_secs(), 5);
    assert!(matches!(
        h.vault.withdraw_catch_up(&ctx),
        Err(VaultError::NotAvailable { .. })
    ));

    // Three payouts of $400 at $2,000.
    assert_eq!(h.custody.paid_to(&HOLDER), 3 * (WAD / 5));
    assert_eq!(h.vault.withdraw_timer(), ctx.now);
    h.assert_backed();
}

#[test]
fn payout_larger_than_deployed_is_refused() {
    let h = harness();
    h.deposit_from(HOLDER, 0, WAD);
    // At $1 the $40 obligation is worth 40 units, far more than deployed.
    h.feed.set(1_00000000);
    let before = h.vault.state();
    assert!(matches!(
        h.vault.withdraw(&h.at(HOLDER, WITHDRAW_DELAY_SECS + 1)),
        Err(VaultError::InsufficientDeployed { .. })
    ));
    assert_eq!(h.vault.state(), before);
    h.assert_backed();
}

// ---------------------------------------------------------------------------
// Emergency Withdrawals
// ---------------------------------------------------------------------------

#[test]
fn partial_emergency_cuts_obligation_pro_rata() {
    let h = harness();
    h.deposit_from(HOLDER, 0, 10 * WAD);
    assert_eq!(h.vault.monthly_pay_usd_e8(), 400_00000000);
    assert_eq!(h.vault.emergency_available().unwrap(), 2 * WAD);

    let ctx = h.at(HOLDER, MIN_EMERGENCY_DELAY_SECS + 1);
    let paid = h.vault.emergency_withdraw(&ctx, WAD).unwrap();
    assert_eq!(paid, WAD);
    // 10% of deployed capital removes 10% of the obligation.
    assert_eq!(h.vault.monthly_pay_usd_e8(), 360_00000000);
    assert_eq!(h.vault.deployed(), 9 * WAD);
    h.assert_backed();
}

#[test]
fn oversized_emergency_is_clamped_to_twenty_percent() {
    let h = harness();
    h.deposit_from(HOLDER, 0, 10 * WAD);
    let ctx = h.at(HOLDER, MIN_EMERGENCY_DELAY_SECS + 1);
    let paid = h.vault.emergency_withdraw(&ctx, 50 * WAD).unwrap();
    assert_eq!(paid, 2 * WAD);
    assert_eq!(h.vault.monthly_pay_usd_e8(), 320_00000000);
    h.assert_backed();
}

#[test]
fn emergency_window_reopens_after_configured_delay() {
    let h = harness();
    h.deposit_from(HOLDER, 0, 10 * WAD);
    let delay = 21 * DAY_SECS;
    h.vault
        .update_emergency_delay(&h.at(HOLDER, 0), delay)
        .unwrap();

    let first = MIN_EMERGENCY_DELAY_SECS + 1;
    assert!(matches!(
        h.vault.emergency_withdraw(&h.at(HOLDER, first), WAD),
        Err(VaultError::NotAvailable { .. })
    ));

    let first = delay + 1;
    h.vault
        .emergency_withdraw(&h.at(HOLDER, first), WAD)
        .unwrap();
    assert!(matches!(
        h.vault.emergency_withdraw(&h.at(HOLDER, first + delay), WAD),
        Err(VaultError::NotAvailable { .. })
    ));
    h.vault
        .emergency_withdraw(&h.at(HOLDER, first + delay + 1), WAD)
        .unwrap();
    h.assert_backed();
}

#[test]
fn emergency_does_not_touch_monthly_timers() {
    let h = harness();
    h.deposit_from(HOLDER, 0, 10 * WAD);
    h.vault
        .emergency_withdraw(&h.at(HOLDER, MIN_EMERGENCY_DELAY_SECS + 1), WAD)
        .unwrap();
    assert_eq!(h.vault.withdraw_timer(), h.t0);
    assert_eq!(h.vault.catch_up_secs(), 0);
}

// ---------------------------------------------------------------------------
// Sweeps
// ---------------------------------------------------------------------------

#[test]
fn foreign_sweep_leaves_vault_accounting_alone() {
    let h = harness();
    h.deposit_from(HOLDER, 0, WAD);
    let token = Address::from_tag(0xaa);
    h.custody.credit_foreign(token, 500);

    h.vault
        .sweep_foreign(&h.at(HOLDER, 0), token, FRIEND, 200)
        .unwrap();
    assert_eq!(h.custody.foreign_balance(&token), 300);
    assert_eq!(h.custody.foreign_paid_to(&token, &FRIEND), 200);
    assert_eq!(h.custody.foreign_paid_to(&token, &HOLDER), 0);
    assert_eq!(h.custody.paid_to(&FRIEND), 0);
    assert_eq!(h.vault.deployed(), WAD);
    h.assert_backed();

    assert!(matches!(
        h.vault.sweep_foreign(&h.at(FRIEND, 0), token, FRIEND, 1),
        Err(VaultError::NotHolder { .. })
    ));
}
