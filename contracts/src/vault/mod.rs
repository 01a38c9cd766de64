//! # Stipend Vault
//!
//! A single holder parks base asset here and draws a monthly stipend worth a
//! fixed USD amount: 2% of the USD value of every deposit, priced at deposit
//! time. Each withdrawal re-prices that USD obligation at the current oracle
//! price, so the holder receives fewer base units when the asset is up and
//! more when it is down.
//!
//! ## Timers
//!
//! - **Withdraw timer**: an ordinary withdrawal is allowed strictly after
//!   `withdraw_timer + WITHDRAW_DELAY_SECS`. Whatever time has passed beyond
//!   that deadline is banked in the catch-up timer.
//! - **Catch-up timer**: while more than one full delay is banked, the
//!   holder may take extra withdrawals, each consuming exactly one delay.
//! - **Emergency timer**: at most one emergency withdrawal per
//!   `emergency_delay_secs`, capped at 20% of the custodied balance and
//!   reducing the obligation in proportion.
//!
//! ## Call discipline
//!
//! Every mutating entry point:
//!
//! 1. raises the re-entrancy guard (a nested call fails with
//!    [`VaultError::Reentrancy`]);
//! 2. computes the next [`VaultState`] on a clone, with checked arithmetic;
//! 3. commits it before any asset leaves custody;
//! 4. on a failed transfer, restores the previous state and undoes the
//!    ledger side effects, so a failed call changes nothing;
//! 5. records its event only once everything has succeeded.

pub mod guard;
pub mod math;
pub mod state;

pub use guard::ReentrancyGuard;
pub use state::{Ownership, VaultState};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

use crate::address::Address;
use crate::config::{MIN_DEPOSIT, MIN_EMERGENCY_DELAY_SECS, WITHDRAW_DELAY_SECS};
use crate::custody::{AssetCustody, CustodyError};
use crate::escrow::{EscrowError, ShareEscrow};
use crate::events::VaultEvent;
use crate::ledger::{LedgerError, ShareLedger};
use crate::oracle::{OracleClient, OracleError, PriceFeed};

use guard::Entered;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during vault operations.
///
/// Every error leaves the vault exactly as it was before the call.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Zero or below-minimum deposit, or a zero-amount request.
    #[error("invalid amount {amount} (minimum {minimum})")]
    InvalidAmount {
        /// Amount supplied.
        amount: u128,
        /// Smallest accepted amount.
        minimum: u128,
    },

    /// A null address where a real counterparty is required.
    #[error("zero address not allowed")]
    ZeroAddress,

    /// Declared deposit and attached value differ.
    #[error("value mismatch: declared {declared}, attached {attached}")]
    EtherMismatch {
        /// Amount argument.
        declared: u128,
        /// Value actually attached to the call.
        attached: u128,
    },

    /// A time gate is still closed, or there is nothing to act on.
    #[error("not available: {reason}")]
    NotAvailable {
        /// What is blocking the call.
        reason: String,
    },

    /// The base-asset transfer failed; the call was rolled back.
    #[error("transfer failed: {0}")]
    TransferFailed(#[source] CustodyError),

    /// The price feed is unusable.
    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// A configuration value below its floor.
    #[error("invalid entry {value} (minimum {minimum})")]
    InvalidEntry {
        /// Value supplied.
        value: u64,
        /// Floor.
        minimum: u64,
    },

    /// The vault always needs an accountable holder.
    #[error("ownership cannot be renounced")]
    CantRenounceContract,

    /// The caller is not the holder.
    #[error("unauthorized: {caller} is not the holder")]
    NotHolder {
        /// The address that attempted the operation.
        caller: Address,
    },

    /// The caller is not the nominated successor, or no handoff is pending.
    #[error("unauthorized: {caller} is not the pending holder")]
    NotPendingHolder {
        /// The address that attempted the operation.
        caller: Address,
    },

    /// A nested call arrived while another call was in flight.
    #[error("reentrant call rejected")]
    Reentrancy,

    /// Fixed-point arithmetic would overflow.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    /// A payout larger than the deployed capital.
    #[error("payout {requested} exceeds deployed capital {deployed}")]
    InsufficientDeployed {
        /// Payout computed.
        requested: u128,
        /// Capital deployed.
        deployed: u128,
    },

    /// The ownership-unit ledger refused an operation.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The escrow refused to release units.
    #[error("escrow error: {0}")]
    Escrow(#[from] EscrowError),
}

// ---------------------------------------------------------------------------
// Call context
// ---------------------------------------------------------------------------

/// Who is calling, what they attached, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Calling address.
    pub caller: Address,
    /// Base units attached to the call.
    pub value: u128,
    /// Current time as seen by the host.
    pub now: DateTime<Utc>,
}

impl CallContext {
    /// A call from `caller` at `now` with nothing attached.
    pub fn new(caller: Address, now: DateTime<Utc>) -> Self {
        Self {
            caller,
            value: 0,
            now,
        }
    }

    /// The same call with `value` attached.
    pub fn with_value(mut self, value: u128) -> Self {
        self.value = value;
        self
    }
}

/// External services a vault is wired to.
#[derive(Clone)]
pub struct Collaborators {
    /// Base-asset price source.
    pub feed: Arc<dyn PriceFeed>,
    /// Ownership-unit ledger.
    pub ledger: Arc<dyn ShareLedger>,
    /// Base-asset custody.
    pub custody: Arc<dyn AssetCustody>,
    /// Address of the escrow the vault binds at construction.
    pub escrow_address: Address,
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// The vault state machine.
///
/// Methods take `&self` so that a payment recipient holding a reference to
/// the vault can attempt to call back in; the guard turns that into an
/// error rather than a second execution.
pub struct Vault {
    state: Mutex<VaultState>,
    guard: ReentrancyGuard,
    oracle: OracleClient,
    ledger: Arc<dyn ShareLedger>,
    custody: Arc<dyn AssetCustody>,
    escrow: ShareEscrow,
    events: Mutex<Vec<VaultEvent>>,
}

impl Vault {
    /// Deploys a new vault at `address` controlled by `holder`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::ZeroAddress`] for a null vault or holder
    /// address, and [`VaultError::Escrow`] if the escrow cannot be bound.
    pub fn deploy(
        address: Address,
        holder: Address,
        now: DateTime<Utc>,
        collaborators: Collaborators,
    ) -> Result<Self, VaultError> {
        if address.is_zero() || holder.is_zero() {
            return Err(VaultError::ZeroAddress);
        }
        let vault = Self::assemble(VaultState::genesis(address, holder, now), collaborators)?;
        tracing::info!(vault = %address, holder = %holder, "vault deployed");
        Ok(vault)
    }

    /// Rebuilds a vault from persisted state.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::ZeroAddress`] if the state names a null vault
    /// or holder, [`VaultError::InvalidEntry`] if its emergency delay is
    /// below the floor, and [`VaultError::Escrow`] if the escrow cannot be
    /// bound.
    pub fn restore(state: VaultState, collaborators: Collaborators) -> Result<Self, VaultError> {
        if state.address.is_zero() || state.holder().is_zero() {
            return Err(VaultError::ZeroAddress);
        }
        if state.emergency_delay_secs < MIN_EMERGENCY_DELAY_SECS {
            return Err(VaultError::InvalidEntry {
                value: state.emergency_delay_secs,
                minimum: MIN_EMERGENCY_DELAY_SECS,
            });
        }
        Self::assemble(state, collaborators)
    }

    fn assemble(state: VaultState, collaborators: Collaborators) -> Result<Self, VaultError> {
        let escrow = ShareEscrow::new(
            collaborators.escrow_address,
            state.address,
            Arc::clone(&collaborators.ledger),
        )?;
        Ok(Self {
            state: Mutex::new(state),
            guard: ReentrancyGuard::new(),
            oracle: OracleClient::new(collaborators.feed),
            ledger: collaborators.ledger,
            custody: collaborators.custody,
            escrow,
            events: Mutex::new(Vec::new()),
        })
    }

    // -----------------------------------------------------------------------
    // Deposits
    // -----------------------------------------------------------------------

    /// Deposits `amount` base units on behalf of the current holder.
    ///
    /// Anyone may deposit. The caller must attach exactly `amount`. The
    /// holder receives `amount` ownership units and the monthly obligation
    /// grows by 2% of the deposit's USD value at the current price. While a
    /// handoff is pending the units are minted straight into escrow, so the
    /// outgoing holder keeps holding none.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidAmount`] for a zero or below-minimum
    /// amount, [`VaultError::EtherMismatch`] if the attached value differs,
    /// and [`VaultError::Oracle`] if the price is unusable.
    pub fn deposit(&self, ctx: &CallContext, amount: u128) -> Result<(), VaultError> {
        let _entered = self.enter()?;

        if amount == 0 || amount < MIN_DEPOSIT {
            return Err(VaultError::InvalidAmount {
                amount,
                minimum: MIN_DEPOSIT,
            });
        }
        if ctx.value != amount {
            return Err(VaultError::EtherMismatch {
                declared: amount,
                attached: ctx.value,
            });
        }

        let price = self.oracle.current_price()?;
        let increment =
            math::payout_increment(amount, price).ok_or(VaultError::ArithmeticOverflow)?;

        let mut next = self.state();
        next.monthly_pay_usd_e8 = next
            .monthly_pay_usd_e8
            .checked_add(increment)
            .ok_or(VaultError::ArithmeticOverflow)?;
        next.deployed = next
            .deployed
            .checked_add(amount)
            .ok_or(VaultError::ArithmeticOverflow)?;

        let holder = next.holder();
        let recipient = match next.ownership {
            Ownership::Stable { .. } => holder,
            Ownership::PendingTransfer { .. } => self.escrow.address(),
        };
        self.ledger.mint(&recipient, amount)?;
        if let Err(e) = self.custody.receive(&ctx.caller, amount) {
            self.undo_mint(&recipient, amount);
            return Err(VaultError::TransferFailed(e));
        }

        *self.state.lock() = next;
        tracing::info!(
            holder = %holder,
            depositor = %ctx.caller,
            recipient = %recipient,
            amount,
            price,
            increment,
            "deposit accepted"
        );
        self.emit(VaultEvent::Deposit { holder, amount });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Withdrawals
    // -----------------------------------------------------------------------

    /// Takes the monthly stipend.
    ///
    /// Allowed strictly after `withdraw_timer + WITHDRAW_DELAY_SECS`. Time
    /// past that deadline is banked in the catch-up timer, and the withdraw
    /// timer moves to `ctx.now`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotHolder`] for any caller but the holder,
    /// [`VaultError::NotAvailable`] before the deadline or when nothing has
    /// accrued, and [`VaultError::TransferFailed`] if the payment fails.
    pub fn withdraw(&self, ctx: &CallContext) -> Result<u128, VaultError> {
        let _entered = self.enter()?;
        let previous = self.state();
        Self::ensure_holder(&previous, ctx)?;

        let deadline = offset(previous.withdraw_timer, WITHDRAW_DELAY_SECS).ok_or_else(|| {
            VaultError::NotAvailable {
                reason: "withdrawal deadline out of range".into(),
            }
        })?;
        if ctx.now <= deadline {
            return Err(VaultError::NotAvailable {
                reason: format!("next withdrawal after {}", deadline.to_rfc3339()),
            });
        }
        let overage = u64::try_from((ctx.now - deadline).num_seconds()).unwrap_or(0);

        let amount = self.monthly_payout(&previous)?;

        let mut next = previous.clone();
        next.catch_up_secs = next
            .catch_up_secs
            .checked_add(overage)
            .ok_or(VaultError::ArithmeticOverflow)?;
        next.withdraw_timer = ctx.now;

        self.settle(previous, next, amount)?;
        tracing::info!(amount, overage, "monthly withdrawal paid");
        Ok(amount)
    }

    /// Takes an extra stipend out of banked catch-up time.
    ///
    /// Requires strictly more than one delay banked; consumes exactly one.
    /// The withdraw timer is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotHolder`] for any caller but the holder,
    /// [`VaultError::NotAvailable`] while `catch_up_secs <=
    /// WITHDRAW_DELAY_SECS`, and [`VaultError::TransferFailed`] if the
    /// payment fails.
    pub fn withdraw_catch_up(&self, ctx: &CallContext) -> Result<u128, VaultError> {
        let _entered = self.enter()?;
        let previous = self.state();
        Self::ensure_holder(&previous, ctx)?;

        if previous.catch_up_secs <= WITHDRAW_DELAY_SECS {
            return Err(VaultError::NotAvailable {
                reason: format!(
                    "{}s of catch-up banked, more than {}s required",
                    previous.catch_up_secs, WITHDRAW_DELAY_SECS
                ),
            });
        }

        let amount = self.monthly_payout(&previous)?;

        let mut next = previous.clone();
        next.catch_up_secs -= WITHDRAW_DELAY_SECS;

        self.settle(previous, next, amount)?;
        tracing::info!(amount, "catch-up withdrawal paid");
        Ok(amount)
    }

    /// Pulls up to 20% of the custodied balance outside the monthly cadence.
    ///
    /// The paid amount is `min(requested, balance * 20%)`. A full 20% drain
    /// cuts the monthly obligation by exactly 20%; a smaller one cuts it by
    /// the share of deployed capital removed.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotHolder`] for any caller but the holder,
    /// [`VaultError::InvalidAmount`] for a zero request,
    /// [`VaultError::NotAvailable`] inside the emergency delay or with
    /// nothing in custody, and [`VaultError::TransferFailed`] if the
    /// payment fails.
    pub fn emergency_withdraw(
        &self,
        ctx: &CallContext,
        requested: u128,
    ) -> Result<u128, VaultError> {
        let _entered = self.enter()?;
        let previous = self.state();
        Self::ensure_holder(&previous, ctx)?;

        if requested == 0 {
            return Err(VaultError::InvalidAmount {
                amount: 0,
                minimum: 1,
            });
        }

        let opens_at = offset(previous.emergency_timer, previous.emergency_delay_secs)
            .ok_or_else(|| VaultError::NotAvailable {
                reason: "emergency delay out of range".into(),
            })?;
        if ctx.now <= opens_at {
            return Err(VaultError::NotAvailable {
                reason: format!("next emergency withdrawal after {}", opens_at.to_rfc3339()),
            });
        }

        let balance = self.custody.balance();
        if balance == 0 || previous.deployed == 0 {
            return Err(VaultError::NotAvailable {
                reason: "nothing in custody".into(),
            });
        }

        let available = math::emergency_available(balance).ok_or(VaultError::ArithmeticOverflow)?;
        let amount = requested.min(available);
        if amount == 0 {
            return Err(VaultError::NotAvailable {
                reason: "emergency allowance rounds to zero".into(),
            });
        }

        let cut = if amount == available {
            math::full_drain_cut(previous.monthly_pay_usd_e8)
        } else {
            math::partial_drain_cut(previous.monthly_pay_usd_e8, amount, previous.deployed)
        };
        let cut = cut.ok_or(VaultError::ArithmeticOverflow)?;

        let mut next = previous.clone();
        next.emergency_timer = ctx.now;
        next.monthly_pay_usd_e8 = next
            .monthly_pay_usd_e8
            .checked_sub(cut)
            .ok_or(VaultError::ArithmeticOverflow)?;

        self.settle(previous, next, amount)?;
        tracing::info!(requested, amount, cut, "emergency withdrawal paid");
        Ok(amount)
    }

    // -----------------------------------------------------------------------
    // Ownership
    // -----------------------------------------------------------------------

    /// Nominates `candidate` as the next holder and parks every unit the
    /// current holder owns in escrow.
    ///
    /// Calling again while a handoff is pending replaces the candidate; the
    /// escrowed units stay where they are.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotHolder`] for any caller but the holder,
    /// [`VaultError::ZeroAddress`] for a null candidate, and
    /// [`VaultError::Ledger`] if the units cannot be moved.
    pub fn transfer_ownership(
        &self,
        ctx: &CallContext,
        candidate: Address,
    ) -> Result<(), VaultError> {
        let _entered = self.enter()?;
        let previous = self.state();
        Self::ensure_holder(&previous, ctx)?;

        if candidate.is_zero() {
            return Err(VaultError::ZeroAddress);
        }

        let holder = previous.holder();
        let units = self.ledger.balance_of(&holder);
        self.ledger
            .transfer(&holder, &self.escrow.address(), units)?;

        let mut next = previous;
        next.ownership = Ownership::PendingTransfer { holder, candidate };
        *self.state.lock() = next;

        tracing::info!(holder = %holder, candidate = %candidate, units, "ownership transfer started");
        self.emit(VaultEvent::OwnershipTransferStarted {
            previous: holder,
            candidate,
        });
        Ok(())
    }

    /// Completes a pending handoff. The caller becomes the holder and
    /// receives every unit held in escrow.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotPendingHolder`] unless the caller is the
    /// nominated candidate, and [`VaultError::Escrow`] if the release fails
    /// (the holder change is then reverted).
    pub fn accept_ownership(&self, ctx: &CallContext) -> Result<(), VaultError> {
        let _entered = self.enter()?;
        let previous = self.state();

        let (outgoing, candidate) = match previous.ownership {
            Ownership::PendingTransfer { holder, candidate } if candidate == ctx.caller => {
                (holder, candidate)
            }
            _ => {
                return Err(VaultError::NotPendingHolder { caller: ctx.caller });
            }
        };

        let mut next = previous.clone();
        next.ownership = Ownership::Stable { holder: candidate };
        *self.state.lock() = next;

        let held = self.escrow.held();
        if let Err(e) = self
            .escrow
            .release_shares(&previous.address, &candidate, held)
        {
            *self.state.lock() = previous;
            tracing::warn!(candidate = %candidate, error = %e, "escrow release failed, handoff reverted");
            return Err(e.into());
        }

        tracing::info!(previous = %outgoing, holder = %candidate, units = held, "ownership transferred");
        self.emit(VaultEvent::OwnershipTransferred {
            previous: outgoing,
            holder: candidate,
        });
        Ok(())
    }

    /// Always fails: the payout protocol has no meaning without a holder.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotHolder`] for any caller but the holder and
    /// [`VaultError::CantRenounceContract`] otherwise.
    pub fn renounce_ownership(&self, ctx: &CallContext) -> Result<(), VaultError> {
        Self::ensure_holder(&self.state(), ctx)?;
        Err(VaultError::CantRenounceContract)
    }

    // -----------------------------------------------------------------------
    // Administration
    // -----------------------------------------------------------------------

    /// Sets the minimum spacing between emergency withdrawals.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotHolder`] for any caller but the holder and
    /// [`VaultError::InvalidEntry`] below `MIN_EMERGENCY_DELAY_SECS`.
    pub fn update_emergency_delay(
        &self,
        ctx: &CallContext,
        new_delay: u64,
    ) -> Result<(), VaultError> {
        let _entered = self.enter()?;
        let previous = self.state();
        Self::ensure_holder(&previous, ctx)?;

        if new_delay < MIN_EMERGENCY_DELAY_SECS {
            return Err(VaultError::InvalidEntry {
                value: new_delay,
                minimum: MIN_EMERGENCY_DELAY_SECS,
            });
        }

        self.state.lock().emergency_delay_secs = new_delay;
        tracing::info!(new_delay, "emergency delay updated");
        self.emit(VaultEvent::DelayUpdated { new_delay });
        Ok(())
    }

    /// Moves a foreign asset that landed at the vault's address to `to`.
    /// Vault accounting is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotHolder`] for any caller but the holder,
    /// [`VaultError::ZeroAddress`] for a null asset or recipient,
    /// [`VaultError::InvalidAmount`] for a zero amount, and
    /// [`VaultError::TransferFailed`] if custody cannot move it.
    pub fn sweep_foreign(
        &self,
        ctx: &CallContext,
        asset: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), VaultError> {
        let _entered = self.enter()?;
        Self::ensure_holder(&self.state(), ctx)?;

        if asset.is_zero() || to.is_zero() {
            return Err(VaultError::ZeroAddress);
        }
        if amount == 0 {
            return Err(VaultError::InvalidAmount {
                amount: 0,
                minimum: 1,
            });
        }

        self.custody
            .send_foreign(&asset, &to, amount)
            .map_err(VaultError::TransferFailed)?;

        tracing::info!(asset = %asset, to = %to, amount, "foreign asset swept");
        self.emit(VaultEvent::ForeignTransfer { asset, amount });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    /// A copy of the full state.
    pub fn state(&self) -> VaultState {
        self.state.lock().clone()
    }

    /// The vault's address.
    pub fn address(&self) -> Address {
        self.state.lock().address
    }

    /// Base units backing the obligation.
    pub fn deployed(&self) -> u128 {
        self.state.lock().deployed
    }

    /// Accrued monthly obligation in USD-E8.
    pub fn monthly_pay_usd_e8(&self) -> u128 {
        self.state.lock().monthly_pay_usd_e8
    }

    /// Banked catch-up seconds.
    pub fn catch_up_secs(&self) -> u64 {
        self.state.lock().catch_up_secs
    }

    /// Last ordinary withdrawal (or creation).
    pub fn withdraw_timer(&self) -> DateTime<Utc> {
        self.state.lock().withdraw_timer
    }

    /// Last emergency withdrawal (or creation).
    pub fn emergency_timer(&self) -> DateTime<Utc> {
        self.state.lock().emergency_timer
    }

    /// Minimum seconds between emergency withdrawals.
    pub fn emergency_delay_secs(&self) -> u64 {
        self.state.lock().emergency_delay_secs
    }

    /// Current holder.
    pub fn holder(&self) -> Address {
        self.state.lock().holder()
    }

    /// Nominated successor, if any.
    pub fn pending_holder(&self) -> Option<Address> {
        self.state.lock().ownership.candidate()
    }

    /// The escrow bound to this vault.
    pub fn escrow(&self) -> &ShareEscrow {
        &self.escrow
    }

    /// Instant after which the next ordinary withdrawal opens.
    pub fn next_withdrawal_at(&self) -> Option<DateTime<Utc>> {
        offset(self.state.lock().withdraw_timer, WITHDRAW_DELAY_SECS)
    }

    /// What an emergency withdrawal could take right now, ignoring the
    /// emergency timer.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::ArithmeticOverflow`] if the balance is too
    /// large to scale.
    pub fn emergency_available(&self) -> Result<u128, VaultError> {
        math::emergency_available(self.custody.balance()).ok_or(VaultError::ArithmeticOverflow)
    }

    /// Base units the next ordinary or catch-up withdrawal would pay at the
    /// current price.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Oracle`] if the price is unusable.
    pub fn preview_payout(&self) -> Result<u128, VaultError> {
        let price = self.oracle.current_price()?;
        math::payout_amount(self.monthly_pay_usd_e8(), price).ok_or(VaultError::ArithmeticOverflow)
    }

    /// Events emitted so far, oldest first.
    pub fn events(&self) -> Vec<VaultEvent> {
        self.events.lock().clone()
    }

    /// Returns and clears the emitted events.
    pub fn drain_events(&self) -> Vec<VaultEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn enter(&self) -> Result<Entered<'_>, VaultError> {
        self.guard.enter().ok_or_else(|| {
            tracing::warn!("reentrant vault call rejected");
            VaultError::Reentrancy
        })
    }

    fn ensure_holder(state: &VaultState, ctx: &CallContext) -> Result<(), VaultError> {
        if ctx.caller != state.holder() {
            return Err(VaultError::NotHolder { caller: ctx.caller });
        }
        Ok(())
    }

    /// Re-prices the monthly obligation into base units.
    fn monthly_payout(&self, state: &VaultState) -> Result<u128, VaultError> {
        let price = self.oracle.current_price()?;
        let amount = math::payout_amount(state.monthly_pay_usd_e8, price)
            .ok_or(VaultError::ArithmeticOverflow)?;
        if amount == 0 {
            return Err(VaultError::NotAvailable {
                reason: "no payout accrued".into(),
            });
        }
        Ok(amount)
    }

    /// Shared tail of every withdrawal: debit `deployed`, burn, commit, pay.
    /// A failed payment restores `previous` and re-mints the burned units.
    fn settle(
        &self,
        previous: VaultState,
        mut next: VaultState,
        amount: u128,
    ) -> Result<(), VaultError> {
        let holder = next.holder();
        next.deployed =
            next.deployed
                .checked_sub(amount)
                .ok_or(VaultError::InsufficientDeployed {
                    requested: amount,
                    deployed: next.deployed,
                })?;

        self.ledger.burn(&holder, amount)?;
        *self.state.lock() = next;

        if let Err(e) = self.custody.send(&holder, amount) {
            *self.state.lock() = previous;
            if let Err(mint_err) = self.ledger.mint(&holder, amount) {
                tracing::error!(holder = %holder, amount, error = %mint_err, "failed to restore burned units");
            }
            tracing::warn!(holder = %holder, amount, error = %e, "payout failed, state rolled back");
            return Err(VaultError::TransferFailed(e));
        }

        self.emit(VaultEvent::Withdraw { holder, amount });
        Ok(())
    }

    fn undo_mint(&self, holder: &Address, amount: u128) {
        if let Err(e) = self.ledger.burn(holder, amount) {
            tracing::error!(holder = %holder, amount, error = %e, "failed to undo mint");
        }
    }

    fn emit(&self, event: VaultEvent) {
        self.events.lock().push(event);
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("state", &*self.state.lock())
            .field("escrow", &self.escrow)
            .finish_non_exhaustive()
    }
}

/// `ts + secs`, or `None` if that is not representable.
fn offset(ts: DateTime<Utc>, secs: u64) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(secs).ok()?;
    ts.checked_add_signed(Duration::try_seconds(secs)?)
}
