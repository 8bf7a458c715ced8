//! Error type of the facade.
//!
//! Session and object operations return [`BindingError`](crate::BindingError)
//! directly. Facade entry points that also touch the file system return this
//! wrapper, which converts from both.

use std::path::PathBuf;
use thiserror::Error;

/// All Vellum facade errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Error from the binding layer
    #[error(transparent)]
    Binding(#[from] vellum_core::Error),

    /// A configuration file could not be read
    #[error("cannot read configuration {path}: {source}")]
    ConfigFile {
        /// File that was read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Result type for facade operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The binding-layer error, if this is one
    pub fn as_binding(&self) -> Option<&vellum_core::Error> {
        match self {
            Error::Binding(e) => Some(e),
            Error::ConfigFile { .. } => None,
        }
    }

    /// Check if the operation was cancelled by the caller.
    pub fn is_cancelled(&self) -> bool {
        self.as_binding().map_or(false, vellum_core::Error::is_cancelled)
    }

    /// Check if this error signals a bug in the calling code.
    pub fn is_programmer_error(&self) -> bool {
        self.as_binding()
            .map_or(false, vellum_core::Error::is_programmer_error)
    }
}
