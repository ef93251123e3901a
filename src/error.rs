//! Error types for auto-unpack
//!
//! Two layers:
//! - [`BackendError`] is what a format backend (ZIP, RAR, 7z) reports for a single
//!   open or extract call. The extraction engine folds it into an
//!   [`ExtractionOutcome`](crate::types::ExtractionOutcome); it never escapes a file's
//!   processing.
//! - [`Error`] is the crate-level error for the few operations that can fail as a whole:
//!   loading configuration and initialising the watcher.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for auto-unpack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for auto-unpack
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "output_dir")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Folder watching error
    #[error("folder watch error: {0}")]
    FolderWatch(String),

    /// Archive backend error surfaced outside the extraction engine
    #[error("archive error: {0}")]
    Backend(#[from] BackendError),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Failure reported by a format backend for one open or extract call
#[derive(Debug, Error)]
pub enum BackendError {
    /// The container format is not handled by this backend
    #[error("unsupported archive {archive}: {reason}")]
    Unsupported {
        /// The archive that could not be handled
        archive: PathBuf,
        /// Why the backend rejected it
        reason: String,
    },

    /// The archive is structurally invalid
    #[error("corrupted archive {archive}: {reason}")]
    Corrupted {
        /// The damaged archive
        archive: PathBuf,
        /// What the backend found wrong
        reason: String,
    },

    /// A password is required, or the supplied one was rejected
    #[error("wrong or missing password for encrypted archive {archive}")]
    BadPassword {
        /// The encrypted archive
        archive: PathBuf,
    },

    /// Filesystem failure while reading the archive or writing entries
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The path being read or written when the error happened
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl BackendError {
    /// Build an I/O variant for the given path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BackendError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means "try another password"
    pub fn is_password_error(&self) -> bool {
        matches!(self, BackendError::BadPassword { .. })
    }
}
