//! # Vellum
//!
//! Typed client binding for an embedded, optionally synchronized object store.
//!
//! Vellum owns the boundary between application code and the native
//! storage/sync engine: every native pointer is wrapped in a handle that is
//! released exactly once, fields are read and written through a closed set of
//! Rust types, and synchronized databases can be opened asynchronously with
//! progress reporting and cancellation.
//!
//! ## Quick Start
//!
//! ```ignore
//! use vellum::prelude::*;
//!
//! let schema = Schema::new(vec![ObjectSchema::new(
//!     "Person",
//!     vec![
//!         Property::new("name", PropertyType::String),
//!         Property::new("age", PropertyType::Int),
//!     ],
//! )]);
//! let session = Database::builder()
//!     .path("/tmp/people.realm")
//!     .schema(schema)
//!     .open()?;
//!
//! session.write(|s| {
//!     let person = s.create_object("Person")?;
//!     person.set("name", "Ada".to_string())?;
//!     person.set("age", 36i64)?;
//!     Ok(())
//! })?;
//! ```
//!
//! ## Async open
//!
//! ```ignore
//! let cancel = CancellationSignal::new();
//! let session = Database::builder()
//!     .path("/tmp/synced.realm")
//!     .sync(SyncConfiguration::new("wss://sync.example.com", user, "partition"))
//!     .open_async(&cancel, None)
//!     .await?;
//! ```

#![warn(missing_docs)]

mod database;
mod error;
mod types;

pub mod prelude;

pub use database::{Database, DatabaseBuilder};
pub use error::{Error, Result};
pub use types::*;
