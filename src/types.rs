//! Public types re-exported from the member crates.

// Configuration and settings
pub use vellum_core::{
    ClientResyncMode, Configuration, CustomLogger, EncryptionKey, LogLevel, ProcessSettings,
    SyncConfiguration, SyncUser,
};

// Schema
pub use vellum_core::{ObjectSchema, Property, PropertyType, Schema};

// Values
pub use vellum_core::{FieldKind, FieldValue, ObjectTypeId, RowIndex, SyncProgress};

// Native boundary
pub use vellum_core::{NativeError, NativeErrorCode};
pub use vellum_native::{
    AsyncOpenMode, MemoryEngine, NativeEngine, NativePtr, ProgressCallback, ResourceKind,
    StatsSnapshot,
};

// Sessions and objects
pub use vellum_concurrency::CancellationSignal;
pub use vellum_engine::{
    Field, LinkList, ManagedObject, ObjectModel, Session, SessionOpener, TableView,
    WriteTransaction, INITIAL_STRING_BUFFER,
};

/// Errors of the binding layer, returned by session and object operations.
pub use vellum_core::Error as BindingError;
