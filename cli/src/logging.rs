//! # Structured Logging
//!
//! The `stipend` binary prints events and status as JSON on stdout, so all
//! diagnostics go to stderr. What shows up there, by level:
//!
//! - `info`: one line per committed vault transition (`stipend_contracts`)
//!   and the CLI's own init/payout lines (`stipend`).
//! - `warn`: rejected operations, reverted payouts and refused re-entry.
//! - `debug`: oracle reads, custody payments, snapshot load/save.
//!
//! `RUST_LOG` overrides the level chosen with `-v`.

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `-v` nor `RUST_LOG` is given.
pub const DEFAULT_FILTER: &str = "stipend=info,stipend_contracts=info";

/// Log output format for stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Compact human-readable lines.
    Pretty,
    /// One JSON object per line, for piping into a log collector.
    Json,
}

/// Maps the `-v` count to filter directives for the two crates this
/// binary logs from. Everything else stays at `warn`.
pub fn filter_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => DEFAULT_FILTER,
        1 => "warn,stipend=debug,stipend_contracts=debug",
        _ => "warn,stipend=trace,stipend_contracts=trace",
    }
}

/// Installs the global subscriber. Call once, before the snapshot is opened.
pub fn init_logging(verbosity: u8, format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_for(verbosity)));

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false),
            )
            .init(),
    }

    tracing::trace!(?format, verbosity, "logging initialized");
}
