//! Re-entrancy guard.
//!
//! A single flag per vault, raised for the whole duration of any
//! state-mutating entry point and lowered when the returned [`Entered`]
//! token drops (including on early `?` returns). The hazard it covers is
//! call-graph re-entry from a payment recipient, not thread contention, so
//! a second entry fails immediately instead of waiting.

use std::sync::atomic::{AtomicBool, Ordering};

/// Mutual-exclusion flag for nested calls into one vault.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    entered: AtomicBool,
}

impl ReentrancyGuard {
    /// A lowered guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the guard, or returns `None` if it is already raised.
    pub fn enter(&self) -> Option<Entered<'_>> {
        self.entered
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Entered {
                flag: &self.entered,
            })
    }

    /// Whether a call is in flight.
    pub fn is_entered(&self) -> bool {
        self.entered.load(Ordering::Acquire)
    }
}

/// Proof that the guard is raised. Lowers it on drop.
#[derive(Debug)]
pub struct Entered<'a> {
    flag: &'a AtomicBool,
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
