//! # Vault Constants
//!
//! Every number that shapes the payout schedule lives here. These are fixed
//! at deployment; the only runtime-tunable parameter is the emergency delay,
//! and even that has a floor defined below.

// ---------------------------------------------------------------------------
// Fixed-Point Scales
// ---------------------------------------------------------------------------

/// Native precision of the base asset: 1 whole unit = 10^18 base units.
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Decimal places of every USD amount the vault handles (prices and the
/// accrued obligation alike).
pub const PRICE_DECIMALS: u8 = 8;

/// Denominator for every basis-point fraction below. 10_000 bp = 100%.
pub const SCALE: u128 = 10_000;

// ---------------------------------------------------------------------------
// Payout Parameters
// ---------------------------------------------------------------------------

/// Monthly stipend as a fraction of deposited USD value: 200 bp = 2%.
pub const PAY_FACTOR: u128 = 200;

/// Fraction of the custodied balance an emergency withdrawal may take:
/// 2_000 bp = 20%.
pub const EMERGENCY_CUT: u128 = 2_000;

/// Smallest deposit accepted, in base units (0.01 of a whole unit).
/// Anything smaller accrues an obligation that truncates to dust.
pub const MIN_DEPOSIT: u128 = 10_000_000_000_000_000;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// One day in seconds.
pub const DAY_SECS: u64 = 86_400;

/// Minimum spacing between ordinary withdrawals: 30 days.
pub const WITHDRAW_DELAY_SECS: u64 = 30 * DAY_SECS;

/// Floor for the configurable emergency delay: 14 days.
pub const MIN_EMERGENCY_DELAY_SECS: u64 = 14 * DAY_SECS;
