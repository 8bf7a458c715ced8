//! Opaque native pointers

use std::fmt;
use std::num::NonZeroU64;

/// Opaque reference to a resource owned by the native engine
///
/// The binding never interprets the value; it only passes it back to the
/// engine that produced it. A pointer is never null.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativePtr(NonZeroU64);

impl NativePtr {
    /// Wrap a raw value, `None` for null
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(NativePtr)
    }

    /// Raw value
    pub fn as_raw(self) -> u64 {
        self.0.get()
    }

    /// Pointer for an allocation counter that starts at zero
    pub(crate) fn from_counter(counter: u64) -> Self {
        NativePtr(NonZeroU64::new(counter.wrapping_add(1)).unwrap_or(NonZeroU64::MAX))
    }
}

impl fmt::Debug for NativePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativePtr({:#x})", self.0)
    }
}

/// Id of a progress registration on an async-open operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgressTokenId(pub u64);
