//! Persisted vault state.
//!
//! [`VaultState`] is the single record the vault mutates. Entry points work
//! on a clone and commit it whole, which is what makes rollback a plain
//! assignment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::config::MIN_EMERGENCY_DELAY_SECS;

/// Who controls the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Ownership {
    /// One accountable holder, no handoff in progress.
    Stable {
        /// Current holder.
        holder: Address,
    },
    /// The holder has nominated a successor and parked their units in escrow.
    PendingTransfer {
        /// Current holder; still the one deposits credit and the only one
        /// allowed to act until the candidate accepts.
        holder: Address,
        /// Nominated successor.
        candidate: Address,
    },
}

impl Ownership {
    /// The current holder in either state.
    pub fn holder(&self) -> Address {
        match self {
            Ownership::Stable { holder } | Ownership::PendingTransfer { holder, .. } => *holder,
        }
    }

    /// The nominated successor, if a handoff is pending.
    pub fn candidate(&self) -> Option<Address> {
        match self {
            Ownership::Stable { .. } => None,
            Ownership::PendingTransfer { candidate, .. } => Some(*candidate),
        }
    }
}

impl std::fmt::Display for Ownership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ownership::Stable { holder } => write!(f, "Stable({})", holder),
            Ownership::PendingTransfer { holder, candidate } => {
                write!(f, "PendingTransfer({} -> {})", holder, candidate)
            }
        }
    }
}

/// Everything the vault remembers between calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultState {
    /// The vault's own address.
    pub address: Address,
    /// Base units backing the payout obligation. Tracks the ownership-unit
    /// supply one for one.
    pub deployed: u128,
    /// Last ordinary withdrawal, or creation.
    pub withdraw_timer: DateTime<Utc>,
    /// Banked seconds of late withdrawals, redeemable one delay at a time.
    pub catch_up_secs: u64,
    /// Last emergency withdrawal, or creation.
    pub emergency_timer: DateTime<Utc>,
    /// Minimum seconds between emergency withdrawals.
    pub emergency_delay_secs: u64,
    /// Accrued monthly obligation in USD-E8.
    pub monthly_pay_usd_e8: u128,
    /// Holder state machine.
    pub ownership: Ownership,
    /// Deployment time.
    pub created_at: DateTime<Utc>,
}

impl VaultState {
    /// State of a freshly deployed vault: every timer at `now`, nothing
    /// deployed, emergency delay at its floor.
    pub fn genesis(address: Address, holder: Address, now: DateTime<Utc>) -> Self {
        Self {
            address,
            deployed: 0,
            withdraw_timer: now,
            catch_up_secs: 0,
            emergency_timer: now,
            emergency_delay_secs: MIN_EMERGENCY_DELAY_SECS,
            monthly_pay_usd_e8: 0,
            ownership: Ownership::Stable { holder },
            created_at: now,
        }
    }

    /// The current holder.
    pub fn holder(&self) -> Address {
        self.ownership.holder()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn genesis_sets_every_timer_to_creation() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let state = VaultState::genesis(Address::from_tag(1), Address::from_tag(2), now);
        assert_eq!(state.withdraw_timer, now);
        assert_eq!(state.emergency_timer, now);
        assert_eq!(state.created_at, now);
        assert_eq!(state.catch_up_secs, 0);
        assert_eq!(state.emergency_delay_secs, MIN_EMERGENCY_DELAY_SECS);
        assert_eq!(state.holder(), Address::from_tag(2));
        assert_eq!(state.ownership.candidate(), None);
    }

    #[test]
    fn pending_transfer_keeps_current_holder() {
        let ownership = Ownership::PendingTransfer {
            holder: Address::from_tag(1),
            candidate: Address::from_tag(2),
        };
        assert_eq!(ownership.holder(), Address::from_tag(1));
        assert_eq!(ownership.candidate(), Some(Address::from_tag(2)));
    }

    #[test]
    fn state_survives_json() {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        let mut state = VaultState::genesis(Address::from_tag(1), Address::from_tag(2), now);
        state.deployed = 5 * crate::config::WAD;
        state.monthly_pay_usd_e8 = 200_00000000;
        let json = serde_json::to_string(&state).unwrap();
        let back: VaultState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
