//! Core identifier types
//!
//! This module defines the small value types used to address data:
//! - [`ObjectTypeId`]: name of a managed object type (one table per type)
//! - [`ColumnIndex`] / [`RowIndex`]: positions inside a native table
//! - [`SyncProgress`]: one download-progress update from the sync client

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identifier of a managed object type
///
/// Each object type maps to exactly one native table. The id is the type's
/// schema name and is cheap to clone.
///
/// # Examples
///
/// ```
/// use vellum_core::types::ObjectTypeId;
///
/// let person = ObjectTypeId::new("Person");
/// assert_eq!(person.as_str(), "Person");
/// assert_eq!(person, ObjectTypeId::from("Person"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectTypeId(Arc<str>);

impl ObjectTypeId {
    /// Create a new type id from a schema name
    pub fn new(name: impl AsRef<str>) -> Self {
        ObjectTypeId(Arc::from(name.as_ref()))
    }

    /// Get the schema name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObjectTypeId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ObjectTypeId {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for ObjectTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Column position inside a native table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnIndex(pub usize);

/// Row position inside a native table
///
/// Row positions shift when earlier rows are removed, so they are re-read from
/// the row handle on every access and never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowIndex(pub usize);

impl fmt::Display for ColumnIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Download progress of an initial sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    /// Bytes downloaded so far
    pub transferred_bytes: u64,
    /// Total bytes the server announced for this download
    pub transferable_bytes: u64,
}

impl SyncProgress {
    /// Create a progress update
    pub fn new(transferred_bytes: u64, transferable_bytes: u64) -> Self {
        Self {
            transferred_bytes,
            transferable_bytes,
        }
    }

    /// Check if everything announced has been transferred
    pub fn is_complete(&self) -> bool {
        self.transferred_bytes >= self.transferable_bytes
    }
}
