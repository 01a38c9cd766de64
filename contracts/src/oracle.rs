//! # Oracle Client
//!
//! The vault never computes prices itself. It asks a [`PriceFeed`] for the
//! latest answer (signed, 8 decimals, the way aggregator feeds report it) and
//! the [`OracleClient`] turns that into an unsigned price the fixed-point
//! math can use.
//!
//! A zero or negative answer means "price unknown". It is surfaced as
//! [`OracleError`] and never replaced with a fallback value: paying out
//! against a made-up price is worse than not paying out at all.

use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure reported by the underlying feed itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    /// The feed could not be reached or has no round to report.
    #[error("price feed unavailable: {0}")]
    Unavailable(String),
}

/// The price could not be used.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleError {
    /// The feed answered with zero or a negative number.
    #[error("oracle reported non-positive price {answer}")]
    NonPositivePrice {
        /// The raw answer.
        answer: i128,
    },

    /// The feed did not answer.
    #[error("oracle feed failed: {0}")]
    Feed(#[from] FeedError),
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// A source of base-asset prices in 8-decimal USD.
pub trait PriceFeed: Send + Sync {
    /// Latest answer. Read-only, no side effects.
    fn latest_answer(&self) -> Result<i128, FeedError>;
}

/// A feed whose answer is set by hand. Used by tests and the CLI, where the
/// price for each command is supplied on the command line.
#[derive(Debug, Default)]
pub struct ManualPriceFeed {
    answer: RwLock<Option<i128>>,
}

impl ManualPriceFeed {
    /// A feed that starts with `answer`.
    pub fn new(answer: i128) -> Self {
        Self {
            answer: RwLock::new(Some(answer)),
        }
    }

    /// A feed with no answer yet; every read fails until [`set`](Self::set).
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Replaces the current answer.
    pub fn set(&self, answer: i128) {
        *self.answer.write() = Some(answer);
    }

    /// Takes the feed offline.
    pub fn clear(&self) {
        *self.answer.write() = None;
    }
}

impl PriceFeed for ManualPriceFeed {
    fn latest_answer(&self) -> Result<i128, FeedError> {
        let answer = *self.answer.read();
        answer.ok_or_else(|| FeedError::Unavailable("no answer published".into()))
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Validating wrapper over a [`PriceFeed`].
#[derive(Clone)]
pub struct OracleClient {
    feed: Arc<dyn PriceFeed>,
}

impl OracleClient {
    /// Wraps a feed.
    pub fn new(feed: Arc<dyn PriceFeed>) -> Self {
        Self { feed }
    }

    /// Current price in 8-decimal USD.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::NonPositivePrice`] for an answer `<= 0` and
    /// [`OracleError::Feed`] when the feed does not answer.
    pub fn current_price(&self) -> Result<u128, OracleError> {
        let answer = self.feed.latest_answer()?;
        if answer <= 0 {
            tracing::warn!(answer, "rejecting non-positive oracle answer");
            return Err(OracleError::NonPositivePrice { answer });
        }
        tracing::debug!(price = answer, "oracle price read");
        Ok(answer as u128)
    }
}

impl std::fmt::Debug for OracleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleClient").finish_non_exhaustive()
    }
}
