//! Error taxonomy for the remapping engine
//!
//! Every failure is fatal for the unit of work it names: configuration and
//! shape problems abort before any remapping starts, a missing field aborts
//! only that field. Nothing is retried.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading inputs or remapping fields
#[derive(Debug, Error)]
pub enum RemapError {
    /// Malformed or out-of-range configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Array dimensions disagree (old/new grids, field vs grid, data vs shape)
    #[error("shape error: {0}")]
    Shape(String),

    /// A configured field is absent from the input store
    #[error("field '{name}' not found in input store")]
    FieldNotFound {
        /// Field name as configured
        name: String,
    },

    /// Several configured fields are absent from the input store
    #[error("{} configured field(s) not found in input store: {}", .0.len(), .0.join(", "))]
    FieldsNotFound(Vec<String>),

    /// Reading or writing a document failed
    #[error("failed to access {path}: {source}")]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A document could not be parsed or serialised
    #[error("failed to parse {what}: {source}")]
    Parse {
        /// Description of the document (usually its path)
        what: String,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },
}

impl RemapError {
    /// Shorthand for a [`RemapError::Config`] with a formatted message
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Shorthand for a [`RemapError::Shape`] with a formatted message
    pub(crate) fn shape(message: impl Into<String>) -> Self {
        Self::Shape(message.into())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, RemapError>;
