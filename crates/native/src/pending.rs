//! Pending async-open state and the completion slot
//!
//! An async open moves through a strict state machine:
//!
//! ```text
//! Requesting ──► WaitingOnNative ──┬──► Completed
//!      │                │          ├──► Failed
//!      └────────────────┴──────────┴──► Cancelled
//! ```
//!
//! Terminal states are absorbing. The transition into a terminal state is a
//! single compare-and-swap, so when native completion races with caller
//! cancellation exactly one of them wins:
//! - completion wins: the outcome is delivered, cancellation is a no-op
//! - cancellation wins: the slot refuses the outcome and hands it back to the
//!   native side, which keeps ownership of any reference it produced
//!
//! The [`CompletionSlot`] is created before the native call is issued and is
//! handed to the engine, so a completion that arrives before the caller starts
//! awaiting is never lost.

use crate::ptr::NativePtr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use vellum_core::NativeError;

/// Outcome of a native async open: a thread-safe session reference or an error
pub type OpenOutcome = std::result::Result<NativePtr, NativeError>;

/// State of an in-flight async open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpenState {
    /// The native call is being issued
    Requesting = 0,
    /// The native engine is performing handshake and initial download
    WaitingOnNative = 1,
    /// A session reference was produced
    Completed = 2,
    /// The caller cancelled before completion
    Cancelled = 3,
    /// The native engine reported an error
    Failed = 4,
}

impl OpenState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => OpenState::Requesting,
            1 => OpenState::WaitingOnNative,
            2 => OpenState::Completed,
            3 => OpenState::Cancelled,
            _ => OpenState::Failed,
        }
    }

    /// Check if no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OpenState::Completed | OpenState::Cancelled | OpenState::Failed
        )
    }
}

/// Shared state of one async open
#[derive(Debug)]
pub struct PendingOpen {
    state: AtomicU8,
}

impl PendingOpen {
    /// Create a pending open in `Requesting`
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(OpenState::Requesting as u8),
        }
    }

    /// Current state
    pub fn state(&self) -> OpenState {
        OpenState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `Requesting → WaitingOnNative`
    ///
    /// Returns `false` if the open already reached a terminal state (the
    /// engine may complete synchronously inside the open call).
    pub fn begin_waiting(&self) -> bool {
        self.state
            .compare_exchange(
                OpenState::Requesting as u8,
                OpenState::WaitingOnNative as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move to `Cancelled` unless a terminal state was already reached
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn try_cancel(&self) -> bool {
        self.try_terminate(OpenState::Cancelled)
    }

    fn try_terminate(&self, target: OpenState) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if OpenState::from_u8(current).is_terminal() {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                target as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for PendingOpen {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot completion slot handed to the native engine
///
/// The engine calls [`CompletionSlot::complete`] exactly once, from any
/// thread. Dropping the slot without completing it resolves the awaiting side
/// with a closed channel.
#[derive(Debug)]
pub struct CompletionSlot {
    pending: Arc<PendingOpen>,
    sender: oneshot::Sender<OpenOutcome>,
}

impl CompletionSlot {
    /// Create a slot and the receiver the opener awaits
    pub fn new(pending: Arc<PendingOpen>) -> (Self, oneshot::Receiver<OpenOutcome>) {
        let (sender, receiver) = oneshot::channel();
        (Self { pending, sender }, receiver)
    }

    /// Check if the caller already cancelled
    pub fn is_cancelled(&self) -> bool {
        self.pending.state() == OpenState::Cancelled
    }

    /// Deliver the outcome
    ///
    /// Moves the pending state to `Completed` or `Failed`. If cancellation won
    /// the race, or the awaiting side is gone, the outcome is handed back and
    /// the engine must release whatever reference it holds.
    pub fn complete(self, outcome: OpenOutcome) -> std::result::Result<(), OpenOutcome> {
        let target = if outcome.is_ok() {
            OpenState::Completed
        } else {
            OpenState::Failed
        };
        if !self.pending.try_terminate(target) {
            return Err(outcome);
        }
        self.sender.send(outcome)
    }
}
