// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Stipend Vault CLI
//!
//! Entry point for the `stipend` binary. Each invocation loads the vault
//! snapshot, applies one operation, prints the events it produced as JSON
//! lines on stdout, and saves the snapshot.
//!
//! - `init`               : deploy a vault into a new snapshot
//! - `deposit`            : deposit base units for the holder
//! - `withdraw`           : take the monthly stipend
//! - `catch-up`           : redeem banked catch-up time
//! - `emergency`          : capped emergency withdrawal
//! - `transfer-ownership` : nominate a successor
//! - `accept-ownership`   : accept a nomination
//! - `set-emergency-delay`: change the emergency spacing
//! - `status`             : print state and views
//! - `version`            : print build version information

mod cli;
mod logging;
mod snapshot;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use std::path::Path;

use stipend_contracts::{CallContext, VaultError};

use cli::{CallArgs, Commands, StipendCli};
use snapshot::Session;

fn main() -> Result<()> {
    let cli = StipendCli::parse();

    if let Commands::Version = cli.command {
        print_version();
        return Ok(());
    }

    logging::init_logging(cli.verbose, cli.log_format);

    let path = cli.state.as_path();
    match cli.command {
        Commands::Init(args) => init_vault(path, args),
        Commands::Status => print_status(path),
        Commands::Version => Ok(()),
        command => apply(path, command),
    }
}

/// Deploys a vault and writes its first snapshot.
fn init_vault(path: &Path, args: cli::InitArgs) -> Result<()> {
    if path.exists() && !args.force {
        anyhow::bail!(
            "snapshot {} already exists (pass --force to overwrite)",
            path.display()
        );
    }

    let now = args.at.unwrap_or_else(Utc::now);
    let session = Session::deploy(
        args.vault,
        args.holder,
        args.escrow,
        args.ledger,
        args.price,
        now,
    )?;
    session.save(path)?;

    tracing::info!(
        vault = %args.vault,
        holder = %args.holder,
        path = %path.display(),
        "vault initialized"
    );

    println!("Vault initialized.");
    println!("  Snapshot : {}", path.display());
    println!("  Vault    : {}", args.vault);
    println!("  Holder   : {}", args.holder);
    println!("  Escrow   : {}", args.escrow);
    Ok(())
}

/// Runs one mutating operation against the snapshot at `path`.
fn apply(path: &Path, command: Commands) -> Result<()> {
    let session = Session::open(path)?;

    let outcome = match &command {
        Commands::Deposit(args) => {
            let ctx = context(&session, &args.call)?.with_value(args.value.unwrap_or(args.amount));
            session.vault.deposit(&ctx, args.amount).map(|_| None)
        }
        Commands::Withdraw(call) => session.vault.withdraw(&context(&session, call)?).map(Some),
        Commands::CatchUp(call) => session
            .vault
            .withdraw_catch_up(&context(&session, call)?)
            .map(Some),
        Commands::Emergency(args) => session
            .vault
            .emergency_withdraw(&context(&session, &args.call)?, args.amount)
            .map(Some),
        Commands::TransferOwnership(args) => session
            .vault
            .transfer_ownership(&context(&session, &args.call)?, args.to)
            .map(|_| None),
        Commands::AcceptOwnership(call) => session
            .vault
            .accept_ownership(&context(&session, call)?)
            .map(|_| None),
        Commands::SetEmergencyDelay(args) => session
            .vault
            .update_emergency_delay(&context(&session, &args.call)?, args.secs)
            .map(|_| None),
        Commands::Init(_) | Commands::Status | Commands::Version => {
            anyhow::bail!("not a vault operation")
        }
    };

    let paid = outcome.map_err(|e| report(&command, e))?;

    for event in session.vault.drain_events() {
        println!(
            "{}",
            serde_json::to_string(&event).context("failed to encode event")?
        );
    }
    if let Some(amount) = paid {
        tracing::info!(amount, "paid out");
    }

    session.save(path)
}

/// Builds the call context and applies any price update.
fn context(session: &Session, call: &CallArgs) -> Result<CallContext> {
    if let Some(price) = call.price {
        session.feed.set(price);
        tracing::debug!(price, "price updated");
    }
    Ok(CallContext::new(call.caller, call.at.unwrap_or_else(Utc::now)))
}

fn report(command: &Commands, err: VaultError) -> anyhow::Error {
    tracing::warn!(error = %err, "operation rejected");
    anyhow::Error::new(err).context(format!("{} failed", operation_name(command)))
}

fn operation_name(command: &Commands) -> &'static str {
    match command {
        Commands::Init(_) => "init",
        Commands::Deposit(_) => "deposit",
        Commands::Withdraw(_) => "withdraw",
        Commands::CatchUp(_) => "catch-up",
        Commands::Emergency(_) => "emergency",
        Commands::TransferOwnership(_) => "transfer-ownership",
        Commands::AcceptOwnership(_) => "accept-ownership",
        Commands::SetEmergencyDelay(_) => "set-emergency-delay",
        Commands::Status => "status",
        Commands::Version => "version",
    }
}

/// State plus derived views, as printed by `status`.
#[derive(Serialize)]
struct Status {
    #[serde(flatten)]
    state: stipend_contracts::VaultState,
    units_outstanding: u128,
    custody_balance: u128,
    escrow_held: u128,
    next_withdrawal_at: Option<chrono::DateTime<Utc>>,
    emergency_available: Option<u128>,
    preview_payout: Option<u128>,
    price_e8: i128,
}

/// Prints the vault's state and views as pretty JSON.
fn print_status(path: &Path) -> Result<()> {
    use stipend_contracts::{AssetCustody, ShareLedger};

    let session = Session::open(path)?;
    let vault = &session.vault;
    let status = Status {
        state: vault.state(),
        units_outstanding: session.ledger.total_supply(),
        custody_balance: session.custody.balance(),
        escrow_held: vault.escrow().held(),
        next_withdrawal_at: vault.next_withdrawal_at(),
        emergency_available: vault.emergency_available().ok(),
        preview_payout: vault.preview_payout().ok(),
        price_e8: session.snapshot().price_e8,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&status).context("failed to encode status")?
    );
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("stipend {}", env!("CARGO_PKG_VERSION"));
    println!("rustc   {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
