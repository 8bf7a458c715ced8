//! Core types for Vellum
//!
//! This crate defines the vocabulary shared by every layer of the binding:
//! - [`Error`]: the error taxonomy of the binding layer
//! - [`FieldKind`] / [`FieldValue`]: the closed set of typed field values
//! - [`Schema`]: object schemas as seen by the accessor layer
//! - [`Configuration`]: validated database and sync configuration
//! - [`ProcessSettings`]: write-once sync client settings

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod schema;
pub mod settings;
pub mod types;
pub mod value;

pub use config::{ClientResyncMode, Configuration, EncryptionKey, SyncConfiguration, SyncUser};
pub use error::{Error, NativeError, NativeErrorCode, Result};
pub use schema::{ObjectSchema, Property, PropertyType, Schema};
pub use settings::{CustomLogger, LogLevel, ProcessSettings, SyncClientSettings};
pub use types::{ColumnIndex, ObjectTypeId, RowIndex, SyncProgress};
pub use value::{FieldKind, FieldValue};
