//! # Stipend Vault Contracts
//!
//! A single-holder savings vault that pays a fixed USD-denominated monthly
//! stipend out of a volatile base asset. Deposits accrue a monthly
//! obligation priced at deposit time; withdrawals re-price it at the current
//! oracle price.
//!
//! - **vault**: the state machine for deposits, monthly and catch-up
//!   withdrawals, capped emergency withdrawals, two-step ownership handoff.
//! - **oracle**: price feed trait and the validating client the vault uses.
//! - **ledger**: transferable ownership units, one per deployed base unit.
//! - **escrow**: parks the holder's units while a handoff is pending.
//! - **custody**: the vault's base-asset balance and payment rail.
//! - **events**: the journal of successful operations.
//! - **config**: fixed-point scales, fractions and delays.
//!
//! ## Design Principles
//!
//! 1. Every amount is an integer. Multiply before dividing, and fail on
//!    overflow instead of wrapping.
//! 2. State is committed before any asset leaves custody, and a failed
//!    payment rolls the whole call back.
//! 3. Ownership is an explicit state machine, not a pair of optional fields.
//! 4. Time is passed in by the caller; nothing reads the system clock.

pub mod address;
pub mod config;
pub mod custody;
pub mod escrow;
pub mod events;
pub mod ledger;
pub mod oracle;
pub mod vault;

pub use address::{Address, AddressError};
pub use custody::{AssetCustody, CustodyError, CustodySnapshot, InMemoryCustody, ReceiveHook};
pub use escrow::{EscrowBinding, EscrowError, ShareEscrow};
pub use events::VaultEvent;
pub use ledger::{InMemoryShareLedger, LedgerError, LedgerSnapshot, ShareLedger};
pub use oracle::{FeedError, ManualPriceFeed, OracleClient, OracleError, PriceFeed};
pub use vault::{CallContext, Collaborators, Ownership, Vault, VaultError, VaultState};
