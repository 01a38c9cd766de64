//! # Vault Snapshots
//!
//! The CLI keeps one vault per JSON file. A [`VaultSnapshot`] carries
//! everything needed to rebuild the vault and its in-memory collaborators:
//! vault state, ledger balances, custody balances, the escrow binding and
//! the last known price.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use stipend_contracts::{
    Address, Collaborators, CustodySnapshot, EscrowBinding, InMemoryCustody, InMemoryShareLedger,
    LedgerSnapshot, ManualPriceFeed, Vault, VaultState,
};

/// Persisted form of a vault and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSnapshot {
    /// Vault state.
    pub state: VaultState,
    /// Ownership-unit balances.
    pub ledger: LedgerSnapshot,
    /// Base-asset and foreign-asset balances.
    pub custody: CustodySnapshot,
    /// Escrow binding.
    pub escrow: EscrowBinding,
    /// Last price fed to the vault, USD with 8 decimals.
    pub price_e8: i128,
}

impl VaultSnapshot {
    /// Reads a snapshot from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        let snapshot: Self = serde_json::from_str(&raw)
            .with_context(|| format!("malformed snapshot {}", path.display()))?;
        tracing::debug!(path = %path.display(), bytes = raw.len(), "snapshot loaded");
        Ok(snapshot)
    }

    /// Writes the snapshot to `path` as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to encode snapshot")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write snapshot {}", path.display()))?;
        tracing::debug!(path = %path.display(), "snapshot saved");
        Ok(())
    }
}

/// A live vault wired to in-memory collaborators.
pub struct Session {
    pub vault: Vault,
    pub feed: Arc<ManualPriceFeed>,
    pub ledger: Arc<InMemoryShareLedger>,
    pub custody: Arc<InMemoryCustody>,
}

impl Session {
    /// Deploys a fresh vault.
    pub fn deploy(
        vault: Address,
        holder: Address,
        escrow: Address,
        ledger: Address,
        price_e8: i128,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let feed = Arc::new(ManualPriceFeed::new(price_e8));
        let ledger = Arc::new(InMemoryShareLedger::new(ledger));
        let custody = Arc::new(InMemoryCustody::new());
        let vault = Vault::deploy(
            vault,
            holder,
            now,
            Collaborators {
                feed: feed.clone(),
                ledger: ledger.clone(),
                custody: custody.clone(),
                escrow_address: escrow,
            },
        )
        .context("failed to deploy vault")?;
        Ok(Self {
            vault,
            feed,
            ledger,
            custody,
        })
    }

    /// Rebuilds a vault from a snapshot.
    pub fn restore(snapshot: VaultSnapshot) -> Result<Self> {
        if snapshot.escrow.vault != snapshot.state.address {
            anyhow::bail!(
                "escrow {} is bound to {}, not to vault {}",
                snapshot.escrow.address,
                snapshot.escrow.vault,
                snapshot.state.address
            );
        }
        let feed = Arc::new(ManualPriceFeed::new(snapshot.price_e8));
        let ledger = Arc::new(InMemoryShareLedger::restore(snapshot.ledger));
        let custody = Arc::new(InMemoryCustody::restore(snapshot.custody));
        let vault = Vault::restore(
            snapshot.state,
            Collaborators {
                feed: feed.clone(),
                ledger: ledger.clone(),
                custody: custody.clone(),
                escrow_address: snapshot.escrow.address,
            },
        )
        .context("failed to restore vault")?;
        Ok(Self {
            vault,
            feed,
            ledger,
            custody,
        })
    }

    /// Loads and rebuilds the vault stored at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        Self::restore(VaultSnapshot::load(path)?)
    }

    /// Captures the current state.
    ///
    /// The price is read back from the feed; an unset feed is stored as 0
    /// so the next call fails on the oracle rather than on the snapshot.
    pub fn snapshot(&self) -> VaultSnapshot {
        use stipend_contracts::PriceFeed;

        VaultSnapshot {
            state: self.vault.state(),
            ledger: self.ledger.snapshot(),
            custody: self.custody.snapshot(),
            escrow: self.vault.escrow().binding(),
            price_e8: self.feed.latest_answer().unwrap_or(0),
        }
    }

    /// Writes the current state to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.snapshot().save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use stipend_contracts::config::WAD;
    use stipend_contracts::{CallContext, ShareLedger};

    const VAULT: Address = Address::from_tag(0x01);
    const ESCROW: Address = Address::from_tag(0x02);
    const LEDGER: Address = Address::from_tag(0x03);
    const HOLDER: Address = Address::from_tag(0x10);

    fn session() -> Session {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Session::deploy(VAULT, HOLDER, ESCROW, LEDGER, 2_000_00000000, t0).unwrap()
    }

    #[test]
    fn snapshot_survives_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");

        let s = session();
        let ctx = CallContext::new(HOLDER, s.vault.withdraw_timer()).with_value(WAD);
        s.vault.deposit(&ctx, WAD).unwrap();
        s.vault
            .transfer_ownership(&ctx, Address::from_tag(0x20))
            .unwrap();
        s.save(&path).unwrap();

        let back = Session::open(&path).unwrap();
        assert_eq!(back.snapshot(), s.snapshot());
        assert_eq!(back.vault.deployed(), WAD);
        assert_eq!(back.vault.pending_holder(), Some(Address::from_tag(0x20)));
        assert_eq!(back.ledger.balance_of(&ESCROW), WAD);
        assert_eq!(back.vault.preview_payout().unwrap(), WAD / 50);
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let err = Session::open(&path).err().unwrap();
        assert!(err.to_string().contains("absent.json"));
    }

    #[test]
    fn mismatched_escrow_binding_rejected() {
        let mut snapshot = session().snapshot();
        snapshot.escrow.vault = Address::from_tag(0x77);
        assert!(Session::restore(snapshot).is_err());
    }
}
