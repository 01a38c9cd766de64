//! # CLI Interface
//!
//! Defines the command-line argument structure for `stipend` using `clap`
//! derive. Every mutating subcommand takes the caller, an optional time
//! override and an optional price update; the vault itself lives in a JSON
//! snapshot file between invocations.

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use stipend_contracts::Address;

use crate::logging::LogFormat;

/// Stipend vault driver.
///
/// Loads a vault snapshot, applies one operation with the given caller,
/// time and price, prints the resulting events, and writes the snapshot
/// back.
#[derive(Parser, Debug)]
#[command(
    name = "stipend",
    about = "Drive a file-backed stipend vault",
    version,
    propagate_version = true
)]
pub struct StipendCli {
    /// Path to the vault snapshot (JSON).
    #[arg(
        long,
        short = 's',
        global = true,
        env = "STIPEND_STATE",
        default_value = "stipend.json"
    )]
    pub state: PathBuf,

    /// Log output format on stderr.
    #[arg(
        long,
        global = true,
        env = "STIPEND_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Pretty
    )]
    pub log_format: LogFormat,

    /// Raise log detail for the vault crates (`-v` debug, `-vv` trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the `stipend` binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy a new vault and write its first snapshot.
    Init(InitArgs),
    /// Deposit base units on behalf of the holder.
    Deposit(DepositArgs),
    /// Take the monthly stipend.
    Withdraw(CallArgs),
    /// Take an extra stipend out of banked catch-up time.
    CatchUp(CallArgs),
    /// Pull up to 20% of the custodied balance.
    Emergency(EmergencyArgs),
    /// Nominate a new holder and park the current holder's units in escrow.
    TransferOwnership(TransferArgs),
    /// Accept a pending nomination.
    AcceptOwnership(CallArgs),
    /// Change the minimum spacing between emergency withdrawals.
    SetEmergencyDelay(DelayArgs),
    /// Print the vault's state and derived views as JSON.
    Status,
    /// Print version information and exit.
    Version,
}

/// Arguments for the `init` subcommand.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Address of the vault itself.
    #[arg(long)]
    pub vault: Address,

    /// First holder.
    #[arg(long)]
    pub holder: Address,

    /// Address of the escrow bound to this vault.
    #[arg(long)]
    pub escrow: Address,

    /// Address of the ownership-unit ledger.
    #[arg(long)]
    pub ledger: Address,

    /// Initial base-asset price in USD with 8 decimals.
    #[arg(long)]
    pub price: i128,

    /// Deployment time (RFC 3339). Defaults to now.
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,

    /// Overwrite an existing snapshot.
    #[arg(long)]
    pub force: bool,
}

/// Caller identity and environment shared by every mutating subcommand.
#[derive(Args, Debug, Clone)]
pub struct CallArgs {
    /// Calling address.
    #[arg(long = "from")]
    pub caller: Address,

    /// Time of the call (RFC 3339). Defaults to now.
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,

    /// New price in USD with 8 decimals, applied before the call.
    #[arg(long)]
    pub price: Option<i128>,
}

/// Arguments for the `deposit` subcommand.
#[derive(Args, Debug)]
pub struct DepositArgs {
    #[command(flatten)]
    pub call: CallArgs,

    /// Base units to deposit.
    #[arg(long)]
    pub amount: u128,

    /// Base units attached to the call. Defaults to `--amount`.
    #[arg(long)]
    pub value: Option<u128>,
}

/// Arguments for the `emergency` subcommand.
#[derive(Args, Debug)]
pub struct EmergencyArgs {
    #[command(flatten)]
    pub call: CallArgs,

    /// Base units requested; the vault pays at most 20% of its balance.
    #[arg(long)]
    pub amount: u128,
}

/// Arguments for the `transfer-ownership` subcommand.
#[derive(Args, Debug)]
pub struct TransferArgs {
    #[command(flatten)]
    pub call: CallArgs,

    /// Nominated successor.
    #[arg(long)]
    pub to: Address,
}

/// Arguments for the `set-emergency-delay` subcommand.
#[derive(Args, Debug)]
pub struct DelayArgs {
    #[command(flatten)]
    pub call: CallArgs,

    /// New delay in seconds.
    #[arg(long)]
    pub secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        StipendCli::command().debug_assert();
    }

    #[test]
    fn deposit_value_defaults_to_none() {
        let cli = StipendCli::try_parse_from([
            "stipend",
            "deposit",
            "--from",
            "0x0000000000000000000000000000000000000010",
            "--amount",
            "1000000000000000000",
        ])
        .unwrap();
        match cli.command {
            Commands::Deposit(args) => {
                assert_eq!(args.amount, 1_000_000_000_000_000_000);
                assert_eq!(args.value, None);
                assert_eq!(args.call.caller, Address::from_tag(0x10));
                assert!(args.call.at.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn time_override_parses_rfc3339() {
        let cli = StipendCli::try_parse_from([
            "stipend",
            "--state",
            "/tmp/vault.json",
            "withdraw",
            "--from",
            "0x0000000000000000000000000000000000000010",
            "--at",
            "2026-02-01T00:00:01Z",
            "--price",
            "200000000000",
        ])
        .unwrap();
        assert_eq!(cli.state, PathBuf::from("/tmp/vault.json"));
        match cli.command {
            Commands::Withdraw(call) => {
                assert_eq!(call.at.unwrap().to_rfc3339(), "2026-02-01T00:00:01+00:00");
                assert_eq!(call.price, Some(2_000_00000000));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn logging_flags_are_global() {
        let cli = StipendCli::try_parse_from([
            "stipend",
            "status",
            "-vv",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_format, LogFormat::Json);

        let cli = StipendCli::try_parse_from(["stipend", "status"]).unwrap();
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.log_format, LogFormat::Pretty);
        assert!(StipendCli::try_parse_from(["stipend", "--log-format", "yaml", "status"]).is_err());
    }

    #[test]
    fn malformed_address_is_rejected() {
        let result =
            StipendCli::try_parse_from(["stipend", "withdraw", "--from", "0x1234"]);
        assert!(result.is_err());
    }
}
