//! Write transaction guard

use crate::session::SessionInner;
use std::fmt;
use tracing::{debug, warn};
use vellum_core::Result;

/// An active write transaction
///
/// Ends with [`commit`](Self::commit) or [`rollback`](Self::rollback);
/// dropping it without either rolls back.
#[must_use = "dropping a write transaction rolls it back"]
pub struct WriteTransaction<'a> {
    session: &'a SessionInner,
    finished: bool,
}

impl<'a> WriteTransaction<'a> {
    pub(crate) fn begin(session: &'a SessionInner) -> Result<Self> {
        session.write.try_begin()?;
        let started = session
            .ptr()
            .and_then(|ptr| Ok(session.engine.begin_write(ptr)?));
        if let Err(e) = started {
            session.write.end();
            return Err(e);
        }
        debug!("write transaction started");
        Ok(Self {
            session,
            finished: false,
        })
    }

    /// Make the changes visible
    ///
    /// A failed commit rolls back before returning the error.
    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        let committed = self
            .session
            .ptr()
            .and_then(|ptr| Ok(self.session.engine.commit_write(ptr)?));
        if committed.is_err() {
            self.cancel();
        }
        self.session.write.end();
        debug!(ok = committed.is_ok(), "write transaction committed");
        committed
    }

    /// Discard the changes
    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        let result = self
            .session
            .ptr()
            .and_then(|ptr| Ok(self.session.engine.cancel_write(ptr)?));
        self.session.write.end();
        debug!("write transaction rolled back");
        result
    }

    fn cancel(&self) {
        if let Ok(ptr) = self.session.ptr() {
            if let Err(e) = self.session.engine.cancel_write(ptr) {
                warn!(error = %e, "rollback failed");
            }
        }
    }
}

impl fmt::Debug for WriteTransaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteTransaction")
            .field("path", &self.session.path)
            .field("finished", &self.finished)
            .finish()
    }
}

impl Drop for WriteTransaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.cancel();
        self.session.write.end();
        debug!("write transaction dropped, rolled back");
    }
}
