//! Observable vault events.
//!
//! One event per successful operation, appended to the vault's journal only
//! after every side effect of the call has succeeded. Failed calls leave no
//! trace here.

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Something the vault did that outside observers care about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultEvent {
    /// Base asset deposited on behalf of the holder.
    Deposit {
        /// Holder credited with the new units.
        holder: Address,
        /// Base units deposited.
        amount: u128,
    },
    /// Base asset paid out to the holder (ordinary, catch-up or emergency).
    Withdraw {
        /// Recipient.
        holder: Address,
        /// Base units paid.
        amount: u128,
    },
    /// A foreign asset was swept out of the vault.
    ForeignTransfer {
        /// The swept asset.
        asset: Address,
        /// Amount moved.
        amount: u128,
    },
    /// The emergency delay changed.
    DelayUpdated {
        /// New delay in seconds.
        new_delay: u64,
    },
    /// The holder nominated a successor; units are now in escrow.
    OwnershipTransferStarted {
        /// Outgoing holder.
        previous: Address,
        /// Nominated successor.
        candidate: Address,
    },
    /// The successor accepted and received the escrowed units.
    OwnershipTransferred {
        /// Outgoing holder.
        previous: Address,
        /// New holder.
        holder: Address,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_keyed_by_name() {
        let event = VaultEvent::DelayUpdated { new_delay: 1_209_600 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["delay_updated"]["new_delay"], 1_209_600);
    }
}
