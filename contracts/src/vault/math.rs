//! Fixed-point conversions between base units and USD-E8.
//!
//! Every function multiplies before it divides, in exactly the order written
//! in its doc comment. Reordering changes where truncation happens and
//! therefore changes payouts; treat the order as part of the contract.
//!
//! All helpers return `None` on overflow or division by zero.

use crate::config::{EMERGENCY_CUT, PAY_FACTOR, SCALE, WAD};

/// Monthly obligation added by a deposit:
/// `amount * price * PAY_FACTOR / SCALE / WAD`.
pub fn payout_increment(amount: u128, price: u128) -> Option<u128> {
    amount
        .checked_mul(price)?
        .checked_mul(PAY_FACTOR)?
        .checked_div(SCALE)?
        .checked_div(WAD)
}

/// Base units that settle a USD-E8 obligation at `price`:
/// `monthly_pay * WAD / price`.
pub fn payout_amount(monthly_pay: u128, price: u128) -> Option<u128> {
    monthly_pay.checked_mul(WAD)?.checked_div(price)
}

/// Largest emergency withdrawal: `balance * EMERGENCY_CUT / SCALE`.
pub fn emergency_available(balance: u128) -> Option<u128> {
    balance.checked_mul(EMERGENCY_CUT)?.checked_div(SCALE)
}

/// Obligation removed by a full emergency drain:
/// `monthly_pay * EMERGENCY_CUT / SCALE`.
pub fn full_drain_cut(monthly_pay: u128) -> Option<u128> {
    monthly_pay.checked_mul(EMERGENCY_CUT)?.checked_div(SCALE)
}

/// Obligation removed by a partial emergency drain of `amount` out of
/// `deployed`: `factor = amount * SCALE / deployed`, then
/// `monthly_pay * factor / SCALE`.
pub fn partial_drain_cut(monthly_pay: u128, amount: u128, deployed: u128) -> Option<u128> {
    let factor = amount.checked_mul(SCALE)?.checked_div(deployed)?;
    monthly_pay.checked_mul(factor)?.checked_div(SCALE)
}
