//! # Share Escrow
//!
//! Holds ownership units while the vault changes hands. The lifecycle is:
//!
//! 1. **Hold**: the outgoing holder starts a transfer; the vault moves every
//!    unit they own to the escrow's address.
//! 2. **Release**: the incoming holder accepts; the vault instructs the
//!    escrow to release the held units to them.
//!
//! The escrow is bound to exactly one vault at construction and obeys no one
//! else. Releasing is crate-private, so outside code only ever sees the
//! read-only views; inside the crate a release naming any caller but the
//! bound vault still fails with [`EscrowError::NotAuthorized`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::address::Address;
use crate::ledger::{LedgerError, ShareLedger};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during escrow operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EscrowError {
    /// Someone other than the bound vault asked for a release.
    #[error("unauthorized: {caller} is not the bound vault")]
    NotAuthorized {
        /// The address that attempted the release.
        caller: Address,
    },

    /// The ledger refused to move the held units.
    #[error("escrow release failed: {0}")]
    Failed(#[source] LedgerError),

    /// The escrow cannot be bound to null identities.
    #[error("escrow requires a vault or ledger address")]
    ZeroAddress,
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The addresses that define an escrow, persisted alongside vault state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowBinding {
    /// Where the escrow holds units on the ledger.
    pub address: Address,
    /// The only vault allowed to request releases.
    pub vault: Address,
}

/// Custodian for ownership units in transit between holders.
///
/// Code outside this crate can inspect an escrow but cannot move its units:
///
/// ```compile_fail
/// use std::sync::Arc;
/// use stipend_contracts::{Address, InMemoryShareLedger, ShareEscrow};
///
/// let vault = Address::from_tag(0x01);
/// let ledger = Arc::new(InMemoryShareLedger::new(Address::from_tag(0x03)));
/// let escrow = ShareEscrow::new(Address::from_tag(0x02), vault, ledger).unwrap();
/// escrow.release_shares(&vault, &Address::from_tag(0x66), 1).unwrap();
/// ```
#[derive(Clone)]
pub struct ShareEscrow {
    binding: EscrowBinding,
    ledger: Arc<dyn ShareLedger>,
}

impl ShareEscrow {
    /// Binds an escrow at `address` to `vault` over `ledger`.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::ZeroAddress`] if the escrow's own address is
    /// null, or if the vault and the ledger are both null.
    pub fn new(
        address: Address,
        vault: Address,
        ledger: Arc<dyn ShareLedger>,
    ) -> Result<Self, EscrowError> {
        if address.is_zero() || (vault.is_zero() && ledger.address().is_zero()) {
            return Err(EscrowError::ZeroAddress);
        }
        Ok(Self {
            binding: EscrowBinding { address, vault },
            ledger,
        })
    }

    /// The escrow's own address.
    pub fn address(&self) -> Address {
        self.binding.address
    }

    /// The vault this escrow answers to.
    pub fn vault(&self) -> Address {
        self.binding.vault
    }

    /// The persisted form of this escrow.
    pub fn binding(&self) -> EscrowBinding {
        self.binding
    }

    /// Units currently held.
    pub fn held(&self) -> u128 {
        self.ledger.balance_of(&self.binding.address)
    }

    /// Releases `amount` held units to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::NotAuthorized`] unless `caller` is the bound
    /// vault, and [`EscrowError::Failed`] if the ledger transfer fails.
    pub(crate) fn release_shares(
        &self,
        caller: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), EscrowError> {
        if *caller != self.binding.vault {
            return Err(EscrowError::NotAuthorized { caller: *caller });
        }

        self.ledger
            .transfer(&self.binding.address, to, amount)
            .map_err(EscrowError::Failed)?;

        tracing::info!(escrow = %self.binding.address, to = %to, amount, "escrowed units released");
        Ok(())
    }
}

impl std::fmt::Debug for ShareEscrow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareEscrow")
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}
