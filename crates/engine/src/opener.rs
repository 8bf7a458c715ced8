//! Session opener
//!
//! Turns a validated [`Configuration`] into an open [`Session`], either
//! synchronously or through the native async-open operation of a
//! synchronized database.
//!
//! ## Async open
//!
//! ```text
//! create PendingOpen + CompletionSlot
//! native open_async(slot)            -> operation handle
//! register progress (through a gate) -> progress token
//! await { slot receiver | cancellation signal }
//!   completed: resolve reference -> session handle
//!   failed:    SessionOpenFailed
//!   cancelled: OperationCancelled
//! cleanup guard: close gate, unregister token, release an undelivered
//!                reference, release operation
//! ```
//!
//! The cleanup guard runs on every exit path, including the future being
//! dropped while it awaits. A cancellation that loses the race against native
//! completion is a no-op and the open succeeds.

use crate::session::Session;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};
use vellum_concurrency::{AsyncOpenHandle, CancellationSignal, ReferenceHandle, SessionHandle};
use vellum_core::{
    Configuration, Error, NativeError, NativeErrorCode, ProcessSettings, Result, Schema,
    SyncProgress,
};
use tokio::sync::oneshot;
use vellum_native::{
    CompletionSlot, NativeConfig, NativeEngine, OpenOutcome, OpenState, PendingOpen,
    ProgressCallback, ProgressTokenId,
};

/// Opens sessions against one engine with one set of process settings
#[derive(Clone)]
pub struct SessionOpener {
    engine: Arc<dyn NativeEngine>,
    settings: Arc<ProcessSettings>,
}

impl SessionOpener {
    /// Create an opener
    pub fn new(engine: Arc<dyn NativeEngine>, settings: Arc<ProcessSettings>) -> Self {
        Self { engine, settings }
    }

    /// Engine sessions are opened on
    pub fn engine(&self) -> &Arc<dyn NativeEngine> {
        &self.engine
    }

    /// Process settings handed to the sync client
    pub fn settings(&self) -> &Arc<ProcessSettings> {
        &self.settings
    }

    /// Open a session synchronously
    pub fn open_sync(&self, config: &Configuration, schema: &Schema) -> Result<Session> {
        config.validate()?;
        self.prepare_sync_client(config);
        let native = NativeConfig::from_configuration(config);
        let ptr = self
            .engine
            .open(&native, schema)
            .map_err(|detail| Error::SessionOpenFailed { detail })?;
        let handle = SessionHandle::acquire(self.engine.clone(), ptr);
        info!(path = %config.path.display(), synchronized = config.is_synchronized(), "session opened");
        self.finish(config, schema, handle)
    }

    /// Open a session through the native async-open operation
    ///
    /// Resolves once the engine completes the open, with
    /// `OperationCancelled` if `cancel` fires first. `progress` receives
    /// download updates until the call resolves and never afterwards.
    pub async fn open_async(
        &self,
        config: &Configuration,
        schema: &Schema,
        cancel: &CancellationSignal,
        progress: Option<ProgressCallback>,
    ) -> Result<Session> {
        config.validate()?;
        self.prepare_sync_client(config);
        let native = NativeConfig::from_configuration(config);

        let pending = Arc::new(PendingOpen::new());
        let (slot, receiver) = CompletionSlot::new(pending.clone());
        let op = self
            .engine
            .open_async(&native, schema, slot)
            .map_err(|detail| Error::SessionOpenFailed { detail })?;
        let mut cleanup = OpenCleanup {
            operation: AsyncOpenHandle::acquire(self.engine.clone(), op),
            pending: pending.clone(),
            receiver,
            token: None,
            gate: None,
        };
        if pending.begin_waiting() {
            debug!(path = %config.path.display(), "waiting on async open");
        }

        if let Some(callback) = progress {
            let gate = Arc::new(ProgressGate::new(callback));
            let forward = gate.clone();
            let token = self
                .engine
                .register_progress(op, Arc::new(move |update| forward.forward(update)))?;
            cleanup.token = Some(token);
            cleanup.gate = Some(gate);
        }

        let received = tokio::select! {
            biased;
            received = &mut cleanup.receiver => received,
            _ = cancel.cancelled() => {
                if cleanup.cancel() {
                    debug!(path = %config.path.display(), "async open cancelled");
                    return Err(Error::OperationCancelled);
                }
                // Completion won the race; its outcome is already in the channel.
                (&mut cleanup.receiver).await
            }
        };
        drop(cleanup);

        let reference = match received {
            Ok(Ok(reference)) => ReferenceHandle::acquire(self.engine.clone(), reference),
            Ok(Err(detail)) => {
                warn!(path = %config.path.display(), error = %detail, "async open failed");
                return Err(Error::SessionOpenFailed { detail });
            }
            Err(_) if pending.state() == OpenState::Cancelled => return Err(Error::OperationCancelled),
            Err(_) => {
                return Err(Error::SessionOpenFailed {
                    detail: NativeError::new(
                        NativeErrorCode::Other,
                        "async open was dropped by the engine without an outcome",
                    ),
                })
            }
        };
        let session = self
            .engine
            .resolve_reference(reference.ptr()?)
            .map_err(|detail| Error::SessionOpenFailed { detail })?;
        let handle = SessionHandle::acquire(self.engine.clone(), session);
        reference.release();
        info!(path = %config.path.display(), "session opened asynchronously");
        self.finish(config, schema, handle)
    }

    /// Hand the process settings to the sync client on the first sync open
    fn prepare_sync_client(&self, config: &Configuration) {
        if !config.is_synchronized() {
            return;
        }
        if let Some(settings) = self.settings.freeze() {
            debug!(user_agent = %settings.user_agent, "configuring sync client");
            self.engine.configure_sync_client(settings);
        }
    }

    fn finish(&self, config: &Configuration, schema: &Schema, handle: SessionHandle) -> Result<Session> {
        // Only a dynamic open without a caller schema reads the file's schema.
        let schema = if config.is_dynamic && schema.is_empty() {
            self.introspect(&handle)?
        } else {
            schema.clone()
        };
        Ok(Session::new(
            self.engine.clone(),
            handle,
            schema,
            config.path.clone(),
            config.read_only,
        ))
    }

    fn introspect(&self, handle: &SessionHandle) -> Result<Schema> {
        let mut found = None;
        self.engine
            .get_schema(handle.ptr()?, &mut |schema| found = Some(schema.clone()))?;
        found.ok_or_else(|| {
            Error::Native(NativeError::new(
                NativeErrorCode::InvalidState,
                "engine reported no schema",
            ))
        })
    }
}

/// Forwards progress updates until closed
///
/// The lock is held while the callback runs, so `close` waits for an
/// in-flight callback and no callback starts afterwards.
struct ProgressGate {
    open: Mutex<bool>,
    callback: ProgressCallback,
}

impl ProgressGate {
    fn new(callback: ProgressCallback) -> Self {
        Self {
            open: Mutex::new(true),
            callback,
        }
    }

    fn forward(&self, update: SyncProgress) {
        let open = self.open.lock();
        if *open {
            (self.callback)(update);
        }
    }

    fn close(&self) {
        *self.open.lock() = false;
    }
}

/// Releases everything an async open registered, on every exit path
struct OpenCleanup {
    operation: AsyncOpenHandle,
    pending: Arc<PendingOpen>,
    receiver: oneshot::Receiver<OpenOutcome>,
    token: Option<ProgressTokenId>,
    gate: Option<Arc<ProgressGate>>,
}

impl OpenCleanup {
    /// Move the open to `Cancelled` and stop the native operation
    ///
    /// Returns `false` if the open already reached a terminal state.
    fn cancel(&self) -> bool {
        if !self.pending.try_cancel() {
            return false;
        }
        if let Ok(op) = self.operation.ptr() {
            self.operation.engine().cancel_open(op);
        }
        true
    }
}

impl Drop for OpenCleanup {
    fn drop(&mut self) {
        if let Some(gate) = &self.gate {
            gate.close();
        }
        if !self.pending.state().is_terminal() && self.cancel() {
            debug!("async open abandoned while waiting, cancelled");
        }
        // A completion nobody received still owns a session reference.
        if let Ok(Ok(reference)) = self.receiver.try_recv() {
            debug!("async open abandoned after completion, releasing reference");
            self.operation.engine().release_reference(reference);
        }
        if let (Some(token), Ok(op)) = (self.token.take(), self.operation.ptr()) {
            self.operation.engine().unregister_progress(op, token);
        }
        self.operation.release();
    }
}
