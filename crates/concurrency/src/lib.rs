//! Concurrency layer for Vellum
//!
//! This crate holds the pieces that must stay correct under concurrent use:
//! - [`NativeHandle`]: exactly-once release of native pointers
//! - [`WriteState`] / [`require_writable`]: the write-transaction guard
//! - [`CancellationSignal`]: caller-driven cancellation of async opens

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod handle;
pub mod transaction;

pub use cancel::CancellationSignal;
pub use handle::{
    AsyncOpenHandle, AsyncOpenKind, HandleKind, LinkListHandle, LinkListKind, NativeHandle,
    ReferenceHandle, ReferenceKind, RowHandle, RowKind, SessionHandle, SessionKind, TableHandle,
    TableKind, ViewHandle, ViewKind,
};
pub use transaction::{require_writable, WriteState};
