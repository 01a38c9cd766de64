//! # Ownership-Unit Ledger
//!
//! Ownership units are the holder's claim on the vault: minted 1:1 with every
//! deposit, burned 1:1 with every payout. The vault only needs five
//! operations from the ledger, captured by [`ShareLedger`]. Standard token
//! semantics beyond that (allowances, metadata) are the ledger's business.
//!
//! [`InMemoryShareLedger`] is the reference implementation used by tests and
//! the CLI. It keeps total supply and per-address balances in step and
//! checks overflow on every operation.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::address::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// The account does not hold enough units.
    #[error("insufficient units: {account} has {balance}, needs {amount}")]
    InsufficientBalance {
        /// Account being debited.
        account: Address,
        /// Its current balance.
        balance: u128,
        /// Amount requested.
        amount: u128,
    },

    /// A supply or balance overflow would occur.
    #[error("supply overflow: minting {amount} would exceed u128::MAX")]
    SupplyOverflow {
        /// The amount that was attempted.
        amount: u128,
    },

    /// Units cannot be minted to or moved to the null address.
    #[error("ledger operation targets the zero address")]
    ZeroAddress,
}

// ---------------------------------------------------------------------------
// Interface
// ---------------------------------------------------------------------------

/// The subset of fungible-unit operations the vault consumes.
pub trait ShareLedger: Send + Sync {
    /// The ledger's own address.
    fn address(&self) -> Address;

    /// Creates `amount` units for `to`.
    fn mint(&self, to: &Address, amount: u128) -> Result<(), LedgerError>;

    /// Destroys `amount` units held by `from`.
    fn burn(&self, from: &Address, amount: u128) -> Result<(), LedgerError>;

    /// Moves `amount` units from `from` to `to`.
    fn transfer(&self, from: &Address, to: &Address, amount: u128) -> Result<(), LedgerError>;

    /// Units held by `who`.
    fn balance_of(&self, who: &Address) -> u128;

    /// Units outstanding.
    fn total_supply(&self) -> u128;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// Serializable image of an [`InMemoryShareLedger`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Ledger address.
    pub address: Address,
    /// Units outstanding.
    pub total_supply: u128,
    /// Non-zero balances.
    pub balances: BTreeMap<Address, u128>,
}

/// Ownership-unit ledger held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryShareLedger {
    inner: RwLock<LedgerSnapshot>,
}

impl InMemoryShareLedger {
    /// An empty ledger living at `address`.
    pub fn new(address: Address) -> Self {
        Self {
            inner: RwLock::new(LedgerSnapshot {
                address,
                ..LedgerSnapshot::default()
            }),
        }
    }

    /// Rebuilds a ledger from a snapshot.
    pub fn restore(snapshot: LedgerSnapshot) -> Self {
        Self {
            inner: RwLock::new(snapshot),
        }
    }

    /// Current image of the ledger.
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.inner.read().clone()
    }
}

impl ShareLedger for InMemoryShareLedger {
    fn address(&self) -> Address {
        self.inner.read().address
    }

    fn mint(&self, to: &Address, amount: u128) -> Result<(), LedgerError> {
        if to.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        let mut inner = self.inner.write();

        let new_supply = inner
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::SupplyOverflow { amount })?;
        let current = inner.balances.get(to).copied().unwrap_or(0);
        let new_balance = current
            .checked_add(amount)
            .ok_or(LedgerError::SupplyOverflow { amount })?;

        inner.total_supply = new_supply;
        if new_balance > 0 {
            inner.balances.insert(*to, new_balance);
        }
        Ok(())
    }

    fn burn(&self, from: &Address, amount: u128) -> Result<(), LedgerError> {
        let mut inner = self.inner.write();

        let balance = inner.balances.get(from).copied().unwrap_or(0);
        if balance < amount {
            return Err(LedgerError::InsufficientBalance {
                account: *from,
                balance,
                amount,
            });
        }

        let remaining = balance - amount;
        if remaining == 0 {
            inner.balances.remove(from);
        } else {
            inner.balances.insert(*from, remaining);
        }
        inner.total_supply = inner.total_supply.saturating_sub(amount);
        Ok(())
    }

    fn transfer(&self, from: &Address, to: &Address, amount: u128) -> Result<(), LedgerError> {
        if to.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        let mut inner = self.inner.write();

        let from_balance = inner.balances.get(from).copied().unwrap_or(0);
        if from_balance < amount {
            return Err(LedgerError::InsufficientBalance {
                account: *from,
                balance: from_balance,
                amount,
            });
        }
        if from == to || amount == 0 {
            return Ok(());
        }

        let to_balance = inner.balances.get(to).copied().unwrap_or(0);
        let new_to = to_balance
            .checked_add(amount)
            .ok_or(LedgerError::SupplyOverflow { amount })?;

        let remaining = from_balance - amount;
        if remaining == 0 {
            inner.balances.remove(from);
        } else {
            inner.balances.insert(*from, remaining);
        }
        inner.balances.insert(*to, new_to);
        Ok(())
    }

    fn balance_of(&self, who: &Address) -> u128 {
        self.inner.read().balances.get(who).copied().unwrap_or(0)
    }

    fn total_supply(&self) -> u128 {
        self.inner.read().total_supply
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        Address::from_tag(0xa1)
    }

    fn bob() -> Address {
        Address::from_tag(0xb0)
    }

    #[test]
    fn mint_increases_supply_and_balance() {
        let ledger = InMemoryShareLedger::new(Address::from_tag(0x11));
        ledger.mint(&alice(), 1_000_000).unwrap();
        assert_eq!(ledger.total_supply(), 1_000_000);
        assert_eq!(ledger.balance_of(&alice()), 1_000_000);
    }

    #[test]
    fn mint_to_zero_address_rejected() {
        let ledger = InMemoryShareLedger::new(Address::from_tag(0x11));
        assert_eq!(
            ledger.mint(&Address::ZERO, 1),
            Err(LedgerError::ZeroAddress)
        );
        assert_eq!(ledger.total_supply(), 0);
    }

    #[test]
    fn mint_overflow_rejected_without_side_effects() {
        let ledger = InMemoryShareLedger::new(Address::from_tag(0x11));
        ledger.mint(&alice(), u128::MAX).unwrap();
        assert!(ledger.mint(&bob(), 1).is_err());
        assert_eq!(ledger.balance_of(&bob()), 0);
        assert_eq!(ledger.total_supply(), u128::MAX);
    }

    #[test]
    fn burn_decreases_supply_and_balance() {
        let ledger = InMemoryShareLedger::new(Address::from_tag(0x11));
        ledger.mint(&alice(), 1_000_000).unwrap();
        ledger.burn(&alice(), 400_000).unwrap();
        assert_eq!(ledger.total_supply(), 600_000);
        assert_eq!(ledger.balance_of(&alice()), 600_000);
    }

    #[test]
    fn burn_more_than_balance_rejected() {
        let ledger = InMemoryShareLedger::new(Address::from_tag(0x11));
        ledger.mint(&alice(), 100).unwrap();
        let err = ledger.burn(&alice(), 200).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                account: alice(),
                balance: 100,
                amount: 200,
            }
        );
        assert_eq!(ledger.total_supply(), 100);
    }

    #[test]
    fn transfer_moves_units_and_keeps_supply() {
        let ledger = InMemoryShareLedger::new(Address::from_tag(0x11));
        ledger.mint(&alice(), 500).unwrap();
        ledger.transfer(&alice(), &bob(), 500).unwrap();
        assert_eq!(ledger.balance_of(&alice()), 0);
        assert_eq!(ledger.balance_of(&bob()), 500);
        assert_eq!(ledger.total_supply(), 500);
        assert!(!ledger.snapshot().balances.contains_key(&alice()));
    }

    #[test]
    fn transfer_beyond_balance_rejected() {
        let ledger = InMemoryShareLedger::new(Address::from_tag(0x11));
        ledger.mint(&alice(), 10).unwrap();
        assert!(ledger.transfer(&alice(), &bob(), 11).is_err());
        assert_eq!(ledger.balance_of(&alice()), 10);
    }

    #[test]
    fn snapshot_restores_state() {
        let ledger = InMemoryShareLedger::new(Address::from_tag(0x11));
        ledger.mint(&alice(), 42).unwrap();
        let restored = InMemoryShareLedger::restore(ledger.snapshot());
        assert_eq!(restored.balance_of(&alice()), 42);
        assert_eq!(restored.total_supply(), 42);
        assert_eq!(restored.address(), Address::from_tag(0x11));
    }
}
