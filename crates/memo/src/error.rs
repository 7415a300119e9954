//! Error type for memoized invocations

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use memostore_remote::StoreError;
use miette::Diagnostic;
use thiserror::Error;

/// Faults raised by the memoization layer itself
///
/// Computations convert this into their own error type through `From`, so
/// their return types stay unchanged when wrapped.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Archiving, fingerprinting or result encoding failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] memostore_cache::Error),

    /// The object store failed in a way that could not be absorbed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    /// The cache context could not be set up
    #[error("Cache context error: {message}")]
    #[diagnostic(
        code(memostore::configuration),
        help("Check the store configuration and the host's thread limits")
    )]
    Configuration {
        /// Error message describing the problem
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }
}

/// Result type for memoization operations
pub type Result<T> = std::result::Result<T, Error>;
