//! # Base-Asset Custody
//!
//! The vault's own balance of the base asset, and the rail it uses to pay
//! people. [`AssetCustody::send`] is the one place where control leaves the
//! vault: a recipient may run arbitrary logic when value arrives, including
//! calling back into the vault. The vault's re-entrancy guard exists because
//! of this method.
//!
//! Foreign assets (anything other than the base asset that ended up at the
//! vault's address) are tracked separately so the holder can sweep them
//! without touching the payout accounting.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::address::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur when moving assets in or out of custody.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CustodyError {
    /// Custody holds less than the amount requested.
    #[error("insufficient custody balance: holds {available}, asked for {requested}")]
    InsufficientFunds {
        /// Current balance.
        available: u128,
        /// Amount requested.
        requested: u128,
    },

    /// The recipient refused the payment.
    #[error("recipient {0} rejected the transfer")]
    Rejected(Address),

    /// The custodied balance would overflow.
    #[error("custody balance overflow")]
    Overflow,
}

// ---------------------------------------------------------------------------
// Interface
// ---------------------------------------------------------------------------

/// Custody of the vault's assets.
pub trait AssetCustody: Send + Sync {
    /// Base-asset balance held for the vault.
    fn balance(&self) -> u128;

    /// Takes `amount` of base asset attached to a call from `from`.
    fn receive(&self, from: &Address, amount: u128) -> Result<(), CustodyError>;

    /// Pays `amount` of base asset to `to`. May hand control to `to`.
    fn send(&self, to: &Address, amount: u128) -> Result<(), CustodyError>;

    /// Balance of a foreign asset held at the vault's address.
    fn foreign_balance(&self, asset: &Address) -> u128;

    /// Moves `amount` of a foreign asset to `to`.
    fn send_foreign(&self, asset: &Address, to: &Address, amount: u128)
        -> Result<(), CustodyError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// Callback run when a base-asset payment lands at a recipient.
pub type ReceiveHook = Arc<dyn Fn(&Address, u128) -> Result<(), CustodyError> + Send + Sync>;

/// Serializable image of an [`InMemoryCustody`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodySnapshot {
    /// Base-asset balance held for the vault.
    pub balance: u128,
    /// Foreign-asset balances held at the vault's address.
    pub foreign: BTreeMap<Address, u128>,
    /// Base asset paid out so far, per recipient.
    pub paid_out: BTreeMap<Address, u128>,
    /// Foreign assets paid out so far, per asset and then per recipient.
    #[serde(default)]
    pub foreign_paid_out: BTreeMap<Address, BTreeMap<Address, u128>>,
}

/// Custody held in memory, with an optional recipient hook.
#[derive(Default)]
pub struct InMemoryCustody {
    state: Mutex<CustodySnapshot>,
    hook: Mutex<Option<ReceiveHook>>,
}

impl InMemoryCustody {
    /// Empty custody.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds custody from a snapshot. Hooks are not persisted.
    pub fn restore(snapshot: CustodySnapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
            hook: Mutex::new(None),
        }
    }

    /// Current image of the custody.
    pub fn snapshot(&self) -> CustodySnapshot {
        self.state.lock().clone()
    }

    /// Installs a callback run on every base-asset payment. If it fails, the
    /// payment is reverted and reported as [`CustodyError::Rejected`].
    pub fn set_receive_hook(&self, hook: ReceiveHook) {
        *self.hook.lock() = Some(hook);
    }

    /// Removes the receive hook.
    pub fn clear_receive_hook(&self) {
        *self.hook.lock() = None;
    }

    /// Credits a foreign asset to the vault's address, as if someone had sent
    /// it there by mistake.
    pub fn credit_foreign(&self, asset: Address, amount: u128) {
        let mut state = self.state.lock();
        let entry = state.foreign.entry(asset).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Total base asset paid to `who`.
    pub fn paid_to(&self, who: &Address) -> u128 {
        self.state.lock().paid_out.get(who).copied().unwrap_or(0)
    }

    /// Total of foreign `asset` paid to `who`.
    pub fn foreign_paid_to(&self, asset: &Address, who: &Address) -> u128 {
        self.state
            .lock()
            .foreign_paid_out
            .get(asset)
            .and_then(|paid| paid.get(who))
            .copied()
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for InMemoryCustody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCustody")
            .field("state", &*self.state.lock())
            .field("hooked", &self.hook.lock().is_some())
            .finish()
    }
}

impl AssetCustody for InMemoryCustody {
    fn balance(&self) -> u128 {
        self.state.lock().balance
    }

    fn receive(&self, _from: &Address, amount: u128) -> Result<(), CustodyError> {
        let mut state = self.state.lock();
        state.balance = state
            .balance
            .checked_add(amount)
            .ok_or(CustodyError::Overflow)?;
        Ok(())
    }

    fn send(&self, to: &Address, amount: u128) -> Result<(), CustodyError> {
        {
            let mut state = self.state.lock();
            if state.balance < amount {
                return Err(CustodyError::InsufficientFunds {
                    available: state.balance,
                    requested: amount,
                });
            }
            state.balance -= amount;
            let paid = state.paid_out.entry(*to).or_insert(0);
            *paid = paid.saturating_add(amount);
        }

        // The lock is released before the hook runs so the recipient can read
        // custody (or call the vault) while it handles the payment.
        let hook = self.hook.lock().clone();
        if let Some(hook) = hook {
            if let Err(e) = hook(to, amount) {
                let mut state = self.state.lock();
                state.balance += amount;
                if let Some(paid) = state.paid_out.get_mut(to) {
                    *paid -= amount;
                    if *paid == 0 {
                        state.paid_out.remove(to);
                    }
                }
                tracing::debug!(recipient = %to, amount, error = %e, "payment reverted by recipient");
                return Err(CustodyError::Rejected(*to));
            }
        }
        Ok(())
    }

    fn foreign_balance(&self, asset: &Address) -> u128 {
        self.state.lock().foreign.get(asset).copied().unwrap_or(0)
    }

    fn send_foreign(
        &self,
        asset: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), CustodyError> {
        let mut state = self.state.lock();
        let held = state.foreign.get(asset).copied().unwrap_or(0);
        if held < amount {
            return Err(CustodyError::InsufficientFunds {
                available: held,
                requested: amount,
            });
        }
        let paid = state
            .foreign_paid_out
            .get(asset)
            .and_then(|paid| paid.get(to))
            .copied()
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or(CustodyError::Overflow)?;

        if held == amount {
            state.foreign.remove(asset);
        } else {
            state.foreign.insert(*asset, held - amount);
        }
        state
            .foreign_paid_out
            .entry(*asset)
            .or_default()
            .insert(*to, paid);
        tracing::debug!(asset = %asset, recipient = %to, amount, "foreign asset paid");
        Ok(())
    }
}
