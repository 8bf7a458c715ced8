//! Session layer for Vellum
//!
//! This crate turns native pointers into typed, session-scoped objects:
//! - [`SessionOpener`]: synchronous and asynchronous session acquisition
//! - [`Session`]: object creation, deletion, queries and write transactions
//! - [`ManagedObject`]: typed field access through the sealed [`Field`] trait
//! - [`LinkList`] / [`TableView`]: lazily bound link lists and query results
//! - [`TableRegistry`]: per-session table and column cache

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod accessor;
pub mod list;
pub mod object;
pub mod opener;
pub mod registry;
pub mod session;
pub mod transaction;
pub mod view;

pub use accessor::{Field, RowCoordinate, INITIAL_STRING_BUFFER};
pub use list::LinkList;
pub use object::{ManagedObject, ObjectModel};
pub use opener::SessionOpener;
pub use registry::{ColumnInfo, TableRegistry};
pub use session::Session;
pub use transaction::WriteTransaction;
pub use view::{TableView, TableViewIter};
