//! Write-transaction state of a session
//!
//! Every mutating accessor calls [`require_writable`] before it touches the
//! engine. The check is binding-side so a rejected write never reaches a
//! native primitive.

use std::sync::atomic::{AtomicBool, Ordering};
use vellum_core::{Error, Result};

/// Whether a session is inside a write transaction
#[derive(Debug, Default)]
pub struct WriteState {
    active: AtomicBool,
}

impl WriteState {
    /// Create an idle state
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a write transaction is active
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Mark a write transaction as started
    ///
    /// Fails with `TransactionActive` if one is already running.
    pub fn try_begin(&self) -> Result<()> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| Error::TransactionActive)
    }

    /// Mark the write transaction as finished
    pub fn end(&self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Fail with `OutsideTransaction` unless a write transaction is active
pub fn require_writable(state: &WriteState) -> Result<()> {
    if state.is_active() {
        Ok(())
    } else {
        Err(Error::OutsideTransaction)
    }
}
