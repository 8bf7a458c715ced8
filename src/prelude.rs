//! Convenient imports for Vellum.
//!
//! ```ignore
//! use vellum::prelude::*;
//! ```

// Main entry point
pub use crate::database::{Database, DatabaseBuilder};

// Error handling
pub use crate::error::{Error, Result};
pub use crate::types::BindingError;

// Configuration
pub use crate::types::{Configuration, EncryptionKey, SyncConfiguration, SyncUser};

// Schema and values
pub use crate::types::{FieldValue, ObjectSchema, Property, PropertyType, Schema, SyncProgress};

// Sessions
pub use crate::types::{
    CancellationSignal, LinkList, ManagedObject, ObjectModel, Session, TableView,
};
