//! Owned native pointers with exactly-once release
//!
//! A [`NativeHandle`] owns one pointer produced by the native engine. The
//! pointer is released through the kind-specific primitive exactly once, on
//! whichever path gets there first:
//!
//! 1. explicit [`NativeHandle::release`]
//! 2. `Drop` (the finalizer path)
//!
//! The `released` flag flips with a single compare-and-swap, so concurrent
//! release calls cannot both reach the engine. Any use after release fails
//! with [`Error::ResourceDisposed`].

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};
use vellum_core::{Error, Result};
use vellum_native::{NativeEngine, NativePtr};

/// Resource kind of a handle: its name and release primitive
pub trait HandleKind: Send + Sync + 'static {
    /// Name reported in `ResourceDisposed`
    const NAME: &'static str;

    /// Free the pointer through the matching engine primitive
    fn release(engine: &dyn NativeEngine, ptr: NativePtr);
}

macro_rules! handle_kind {
    ($(#[$doc:meta])* $kind:ident, $alias:ident, $name:literal, $release:ident) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub enum $kind {}

        impl HandleKind for $kind {
            const NAME: &'static str = $name;

            fn release(engine: &dyn NativeEngine, ptr: NativePtr) {
                engine.$release(ptr);
            }
        }

        #[doc = concat!("Owned ", $name, " pointer")]
        pub type $alias = NativeHandle<$kind>;
    };
}

handle_kind!(
    /// Open database session
    SessionKind, SessionHandle, "session", close_session
);
handle_kind!(
    /// Thread-safe session reference produced by an async open
    ReferenceKind, ReferenceHandle, "session reference", release_reference
);
handle_kind!(
    /// Table backing one object type
    TableKind, TableHandle, "table", release_table
);
handle_kind!(
    /// Tracked row backing one managed object
    RowKind, RowHandle, "row", release_row
);
handle_kind!(
    /// Link list cell
    LinkListKind, LinkListHandle, "link list", release_link_list
);
handle_kind!(
    /// Query result view
    ViewKind, ViewHandle, "table view", release_view
);
handle_kind!(
    /// In-flight async open
    AsyncOpenKind, AsyncOpenHandle, "async open", release_open
);

/// Owner of one native pointer
pub struct NativeHandle<K: HandleKind> {
    engine: Arc<dyn NativeEngine>,
    ptr: NativePtr,
    released: AtomicBool,
    _kind: PhantomData<fn() -> K>,
}

impl<K: HandleKind> NativeHandle<K> {
    /// Take ownership of a pointer the engine just produced
    pub fn acquire(engine: Arc<dyn NativeEngine>, ptr: NativePtr) -> Self {
        trace!(kind = K::NAME, ptr = ptr.as_raw(), "handle acquired");
        Self {
            engine,
            ptr,
            released: AtomicBool::new(false),
            _kind: PhantomData,
        }
    }

    /// The pointer, or `ResourceDisposed` once released
    pub fn ptr(&self) -> Result<NativePtr> {
        if self.released.load(Ordering::Acquire) {
            return Err(Error::ResourceDisposed { kind: K::NAME });
        }
        Ok(self.ptr)
    }

    /// Check if the pointer has not been released
    pub fn is_valid(&self) -> bool {
        !self.released.load(Ordering::Acquire)
    }

    /// Engine that owns the pointer
    pub fn engine(&self) -> &Arc<dyn NativeEngine> {
        &self.engine
    }

    /// Release the pointer
    ///
    /// Returns `true` for the call that performed the release. Later calls
    /// are no-ops.
    pub fn release(&self) -> bool {
        if self
            .released
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(kind = K::NAME, ptr = self.ptr.as_raw(), "handle already released");
            return false;
        }
        K::release(self.engine.as_ref(), self.ptr);
        trace!(kind = K::NAME, ptr = self.ptr.as_raw(), "handle released");
        true
    }
}

impl<K: HandleKind> Drop for NativeHandle<K> {
    fn drop(&mut self) {
        if !*self.released.get_mut() {
            self.release();
        }
    }
}

impl<K: HandleKind> fmt::Debug for NativeHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("kind", &K::NAME)
            .field("ptr", &self.ptr)
            .field("released", &!self.is_valid())
            .finish()
    }
}
