//! Native engine boundary for Vellum
//!
//! This crate defines what the binding may ask of the storage/sync engine:
//! - [`NativeEngine`]: the primitive calls, addressed by [`NativePtr`]
//! - [`PendingOpen`] / [`CompletionSlot`]: the async-open state machine
//! - [`MemoryEngine`]: a process-local engine implementing every primitive

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod memory;
pub mod pending;
pub mod ptr;

pub use engine::{NativeConfig, NativeEngine, NativeResult, NativeSyncConfig, ProgressCallback};
pub use memory::{AsyncOpenMode, MemoryEngine, ResourceKind, StatsSnapshot};
pub use pending::{CompletionSlot, OpenOutcome, OpenState, PendingOpen};
pub use ptr::{NativePtr, ProgressTokenId};
