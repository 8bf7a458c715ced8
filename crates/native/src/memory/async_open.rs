//! Async-open operations of the in-memory engine
//!
//! An [`AsyncOp`] holds the completion slot and the progress listeners of one
//! `open_async` call. In [`AsyncOpenMode::Background`] a worker thread plays
//! the sync client: it waits, reports each configured progress step and then
//! completes the open. In [`AsyncOpenMode::Manual`] the test drives the same
//! steps through [`MemoryEngine`](super::MemoryEngine) methods.

use crate::engine::{NativeConfig, ProgressCallback};
use crate::pending::CompletionSlot;
use crate::ptr::ProgressTokenId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use vellum_core::{Schema, SyncProgress};

/// How the engine drives async opens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsyncOpenMode {
    /// A worker thread reports `steps` after `delay`, then completes
    Background {
        /// Wait before the first progress step
        delay: Duration,
        /// Progress updates of the initial download
        steps: Vec<SyncProgress>,
    },
    /// Nothing happens until the caller drives the operation
    Manual,
}

impl Default for AsyncOpenMode {
    fn default() -> Self {
        AsyncOpenMode::Background {
            delay: Duration::from_millis(10),
            steps: Vec::new(),
        }
    }
}

/// State of one `open_async` call
pub(crate) struct AsyncOp {
    pub(crate) config: NativeConfig,
    pub(crate) schema: Schema,
    slot: Mutex<Option<CompletionSlot>>,
    listeners: Mutex<Vec<(ProgressTokenId, ProgressCallback)>>,
    cancelled: AtomicBool,
}

impl AsyncOp {
    pub(crate) fn new(config: NativeConfig, schema: Schema, slot: CompletionSlot) -> Self {
        Self {
            config,
            schema,
            slot: Mutex::new(Some(slot)),
            listeners: Mutex::new(Vec::new()),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Check if the operation can still complete
    pub(crate) fn is_pending(&self) -> bool {
        !self.cancelled.load(Ordering::Acquire) && self.slot.lock().is_some()
    }

    /// Take the slot for completion, `None` if cancelled or already completed
    pub(crate) fn take_slot(&self) -> Option<CompletionSlot> {
        if self.cancelled.load(Ordering::Acquire) {
            return None;
        }
        self.slot.lock().take()
    }

    /// Stop the operation and drop its slot
    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.slot.lock().take();
    }

    pub(crate) fn add_listener(&self, token: ProgressTokenId, callback: ProgressCallback) {
        self.listeners.lock().push((token, callback));
    }

    pub(crate) fn remove_listener(&self, token: ProgressTokenId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(t, _)| *t != token);
        listeners.len() != before
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Deliver one progress update to every listener
    ///
    /// Listeners are invoked outside the lock so they may unregister
    /// themselves. Returns the number of listeners called.
    pub(crate) fn report(&self, progress: SyncProgress) -> usize {
        if !self.is_pending() {
            return 0;
        }
        let listeners: Vec<ProgressCallback> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in &listeners {
            callback(progress);
        }
        listeners.len()
    }
}
