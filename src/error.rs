//! Custom error types for the library.
//!
//! This module defines the primary error type, `CldError`, shared by every component.
//! Using the `thiserror` crate, it provides a single, consistent taxonomy for everything
//! that can go wrong between loading a configuration document and writing log rows.
//!
//! ## Error Hierarchy
//!
//! - **Build errors** (`ConfigParse`, `UnknownType`, `DuplicateName`): fatal to
//!   [`build`](crate::builder::build). No partially populated registry is ever returned.
//! - **Lifecycle errors** (`FileOpen`, `InvalidState`, `NotFound`): recoverable. The caller may retry
//!   after fixing the file system or reissuing operations in the right order.
//! - **`SinkWrite`**: a failed append to an open log file. The acquisition loop reports
//!   these to its observer and keeps running.
//! - **Ambient errors** (`Settings`, `Configuration`, `Io`): settings loading and
//!   validation, plus plain I/O such as reading a document file.
//! - **`ToggleFailed`**: aggregates the per-log failures of a toggle handler pass.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the library error type.
pub type CldResult<T> = std::result::Result<T, CldError>;

/// Every failure surfaced by the builder, the registry, log components and acquisition.
#[derive(Error, Debug)]
pub enum CldError {
    /// The configuration document is syntactically malformed.
    #[error("Configuration parse error: {0}")]
    ConfigParse(String),

    /// A document node declares a type tag with no known runtime variant.
    #[error("Unknown object type '{type_tag}' for object '{name}'")]
    UnknownType {
        /// Name of the offending node.
        name: String,
        /// The unresolved type tag.
        type_tag: String,
    },

    /// Two document nodes share the same name.
    #[error("Duplicate object name '{0}'")]
    DuplicateName(String),

    /// A log file could not be opened.
    #[error("Failed to open log file '{}': {source}", path.display())]
    FileOpen {
        /// Path that was being opened.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An operation was attempted in a state that does not permit it.
    #[error("Cannot {operation} '{name}' while {state}")]
    InvalidState {
        /// Name of the component.
        name: String,
        /// Operation that was rejected.
        operation: &'static str,
        /// State the component was in.
        state: String,
    },

    /// A named object or log does not exist in the registry.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Appending a record to a log sink failed.
    #[error("Failed to write to log '{name}': {message}")]
    SinkWrite {
        /// Name of the log component.
        name: String,
        /// Description of the failure.
        message: String,
    },

    /// Settings could not be extracted.
    #[error("Settings error: {0}")]
    Settings(#[from] Box<figment::Error>),

    /// Settings were loaded but failed validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Plain I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// One or more log components failed during a toggle.
    #[error("Toggle failed with {} error(s)", .0.len())]
    ToggleFailed(Vec<CldError>),
}

impl CldError {
    pub(crate) fn invalid_state(
        name: impl Into<String>,
        operation: &'static str,
        state: impl std::fmt::Display,
    ) -> Self {
        CldError::InvalidState {
            name: name.into(),
            operation,
            state: state.to_string(),
        }
    }

    /// Whether the caller can reasonably retry after correcting state or resources.
    pub fn is_recoverable(&self) -> bool {
        match self {
            CldError::ConfigParse(_)
            | CldError::UnknownType { .. }
            | CldError::DuplicateName(_)
            | CldError::Settings(_)
            | CldError::Configuration(_) => false,
            CldError::FileOpen { .. }
            | CldError::InvalidState { .. }
            | CldError::NotFound(_)
            | CldError::SinkWrite { .. }
            | CldError::Io(_) => true,
            CldError::ToggleFailed(errors) => errors.iter().all(CldError::is_recoverable),
        }
    }
}

impl From<figment::Error> for CldError {
    fn from(value: figment::Error) -> Self {
        CldError::Settings(Box::new(value))
    }
}
