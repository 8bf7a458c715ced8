//! Error types for the binding layer
//!
//! Every fallible operation in Vellum returns [`Error`]. The variants fall into
//! three groups:
//!
//! | Group | Variants | Caller action |
//! |-------|----------|---------------|
//! | Programmer errors | `ResourceDisposed`, `UnsupportedFieldType`, `NotSupported`, `TypeMismatch`, ... | Fix the call site, never retry |
//! | Recoverable | `OutsideTransaction`, `SessionOpenFailed`, `Native` | Start a transaction / decide whether to retry |
//! | Terminal states | `OperationCancelled` | Not an error to retry; the caller asked for it |
//!
//! Errors reported by the native engine travel as [`NativeError`] and are
//! wrapped in [`Error::Native`] or, for open failures, in
//! [`Error::SessionOpenFailed`].

use crate::schema::PropertyType;
use crate::value::FieldKind;
use thiserror::Error;

/// Error codes reported by the native engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeErrorCode {
    /// The file could not be opened or created
    FileAccess,
    /// The on-disk schema does not match the requested schema
    SchemaMismatch,
    /// The encryption key does not decrypt the file
    InvalidEncryptionKey,
    /// Sync handshake or download failed
    Sync,
    /// A column or row index was out of bounds
    IndexOutOfBounds,
    /// The stored column type differs from the accessed type
    ColumnType,
    /// The operation is not valid in the engine's current state
    InvalidState,
    /// Anything else
    Other,
}

/// Error detail produced by the native engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code:?}: {message}")]
pub struct NativeError {
    /// Machine-readable code
    pub code: NativeErrorCode,
    /// Human-readable detail from the engine
    pub message: String,
}

impl NativeError {
    /// Create a new native error
    pub fn new(code: NativeErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// All binding-layer errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A handle was used after it was released
    #[error("{kind} handle used after release")]
    ResourceDisposed {
        /// Handle kind name (e.g. "row", "session")
        kind: &'static str,
    },

    /// The requested field type is outside the supported set
    #[error("unsupported field type: {property_type:?}")]
    UnsupportedFieldType {
        /// Declared type of the property
        property_type: PropertyType,
    },

    /// A mutation was attempted without an active write transaction
    #[error("cannot modify managed objects outside a write transaction")]
    OutsideTransaction,

    /// A write transaction is already active on this session
    #[error("a write transaction is already active on this session")]
    TransactionActive,

    /// The native open call failed
    #[error("failed to open database session: {detail}")]
    SessionOpenFailed {
        /// Detail from the native engine
        detail: NativeError,
    },

    /// The async open was cancelled before the native engine completed
    #[error("operation cancelled")]
    OperationCancelled,

    /// The operation exists but is deliberately not supported
    #[error("not supported: {0}")]
    NotSupported(String),

    /// The owning session was closed or dropped
    #[error("database session is closed")]
    SessionClosed,

    /// The object is not bound to a session
    #[error("object is not managed by a database session")]
    NotManaged,

    /// The row behind a managed object was deleted
    #[error("row of {object_type} object has been deleted")]
    RowDetached {
        /// Object type of the detached row
        object_type: String,
    },

    /// No table exists for the object type
    #[error("unknown object type: {0}")]
    UnknownObjectType(String),

    /// No column exists for the property name
    #[error("unknown property {property} on {object_type}")]
    UnknownProperty {
        /// Object type that was searched
        object_type: String,
        /// Property that was requested
        property: String,
    },

    /// The requested field kind does not match the column's declared type
    #[error("type mismatch on {property}: column is {declared:?}, requested {requested:?}")]
    TypeMismatch {
        /// Property name
        property: String,
        /// Declared property type
        declared: PropertyType,
        /// Requested field kind
        requested: FieldKind,
    },

    /// A stored value does not fit the requested type
    #[error("value {value} of {property} does not fit in {requested:?}")]
    ValueOutOfRange {
        /// Property name
        property: String,
        /// Stored value
        value: i64,
        /// Requested field kind
        requested: FieldKind,
    },

    /// Stored string bytes were not valid UTF-8
    #[error("string in {property} is not valid UTF-8")]
    InvalidUtf8 {
        /// Property name
        property: String,
    },

    /// A link was set to an object of the wrong type or session
    #[error("invalid link target: {0}")]
    InvalidLinkTarget(String),

    /// Index past the end of a list or view
    #[error("index {index} out of range for {what} of length {len}")]
    IndexOutOfRange {
        /// Collection name
        what: &'static str,
        /// Requested index
        index: usize,
        /// Collection length
        len: usize,
    },

    /// The configuration failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Process settings were mutated after first use
    #[error("process settings are frozen after the first sync session open")]
    SettingsFrozen,

    /// Any other native failure
    #[error("native error: {0}")]
    Native(#[from] NativeError),
}

/// Result type for binding-layer operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error signals a bug in the calling code.
    ///
    /// These are fatal to the call and must never be retried.
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            Error::ResourceDisposed { .. }
                | Error::UnsupportedFieldType { .. }
                | Error::NotSupported(_)
                | Error::NotManaged
                | Error::TypeMismatch { .. }
                | Error::UnknownProperty { .. }
                | Error::UnknownObjectType(_)
                | Error::InvalidLinkTarget(_)
                | Error::SettingsFrozen
        )
    }

    /// Check if the caller can recover without changing code.
    ///
    /// `OutsideTransaction` is recovered by starting a transaction; open
    /// failures are left to the caller's retry policy.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::OutsideTransaction | Error::SessionOpenFailed { .. } | Error::Native(_)
        )
    }

    /// Check if this is the cancelled terminal state of an async open.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::OperationCancelled)
    }
}
