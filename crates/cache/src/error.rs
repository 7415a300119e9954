//! Error types for the cache crate

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Error type for archive, fingerprint and codec operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// I/O error while writing or reading an in-memory archive
    #[error("I/O {operation} failed")]
    #[diagnostic(code(memostore::cache::io))]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Operation that failed (e.g., "write entry", "rewind")
        operation: String,
    },

    /// The zip container could not be written or parsed
    #[error("Archive error while {operation}: {message}")]
    #[diagnostic(
        code(memostore::cache::archive),
        help("Cached entries must be zip archives produced by memostore")
    )]
    Archive {
        /// Operation that failed
        operation: String,
        /// Error message from the zip layer
        message: String,
    },

    /// A named entry is missing from an archive
    #[error("Archive entry not found: {entry}")]
    #[diagnostic(
        code(memostore::cache::entry_not_found),
        help("The archive may have been stored before its result was appended")
    )]
    EntryNotFound {
        /// The entry that was not found
        entry: String,
    },

    /// A result entry was appended to an archive that already has one
    #[error("Archive already contains a result entry")]
    #[diagnostic(code(memostore::cache::result_present))]
    ResultAlreadyPresent,

    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(
        code(memostore::cache::serialization),
        help("Arguments and results must have a defined byte representation")
    )]
    Serialization {
        /// Error message describing the serialization issue
        message: String,
    },

    /// A string is not a valid fingerprint
    #[error("Invalid fingerprint '{value}': expected 32 lowercase hex characters")]
    #[diagnostic(code(memostore::cache::invalid_fingerprint))]
    InvalidFingerprint {
        /// The rejected value
        value: String,
    },
}

impl Error {
    /// Create an I/O error
    #[must_use]
    pub fn io(source: std::io::Error, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            operation: operation.into(),
        }
    }

    /// Create an archive error from a zip failure
    #[must_use]
    pub fn archive(operation: impl Into<String>, err: &zip::result::ZipError) -> Self {
        Self::Archive {
            operation: operation.into(),
            message: err.to_string(),
        }
    }

    /// Create an entry not found error
    #[must_use]
    pub fn entry_not_found(entry: impl Into<String>) -> Self {
        Self::EntryNotFound {
            entry: entry.into(),
        }
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create an invalid fingerprint error
    #[must_use]
    pub fn invalid_fingerprint(value: impl Into<String>) -> Self {
        Self::InvalidFingerprint {
            value: value.into(),
        }
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::serialization(format!("Failed to encode result: {err}"))
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::serialization(format!("Failed to decode result: {err}"))
    }
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, Error>;
