//! Error types for store operations

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for object store operations
#[derive(Error, Debug, Diagnostic)]
pub enum StoreError {
    /// The object does not exist
    #[error("Object not found: {key}")]
    #[diagnostic(code(memostore::store::not_found))]
    NotFound {
        /// Object key that was looked up
        key: String,
    },

    /// The store refused the operation
    #[error("Permission denied during {operation} of {target}: {message}")]
    #[diagnostic(
        code(memostore::store::permission_denied),
        help("Check the credentials file and the bucket's IAM bindings")
    )]
    PermissionDenied {
        /// Operation that was refused (e.g., "put", "create bucket")
        operation: String,
        /// Object key or bucket name
        target: String,
        /// Message returned by the store
        message: String,
    },

    /// Required configuration was never provided
    #[error("Store configuration missing: {field}")]
    #[diagnostic(
        code(memostore::store::configuration_missing),
        help("Provide the missing setting in the store configuration file")
    )]
    ConfigurationMissing {
        /// Name of the missing setting
        field: String,
    },

    /// Configuration was provided but is unusable
    #[error("Invalid store configuration: {message}")]
    #[diagnostic(code(memostore::store::configuration))]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Configuration file could not be parsed
    #[error("Failed to parse store configuration {}: {message}", path.display())]
    #[diagnostic(code(memostore::store::config_parse))]
    ConfigParse {
        /// Path to the configuration file
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// The store could not be reached
    #[error("Connection failed during {operation}: {message}")]
    #[diagnostic(
        code(memostore::store::connection),
        help("Check network connectivity and the store endpoint")
    )]
    Connection {
        /// Operation that failed
        operation: String,
        /// Transport error message
        message: String,
    },

    /// The store answered with an unexpected status
    #[error("Store returned HTTP {status} during {operation}: {message}")]
    #[diagnostic(code(memostore::store::http))]
    Http {
        /// Operation that failed
        operation: String,
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// An operation did not complete in time
    #[error("Operation '{operation}' timed out after {seconds}s")]
    #[diagnostic(code(memostore::store::timeout))]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Configured timeout
        seconds: u64,
    },

    /// Local filesystem failure
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(memostore::store::io),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "write", "rename")
        operation: String,
    },

    /// An object key that cannot be mapped onto the store
    #[error("Invalid object key: {key}")]
    #[diagnostic(code(memostore::store::invalid_key))]
    InvalidKey {
        /// The rejected key
        key: String,
    },

    /// All retry attempts failed
    #[error("Operation '{operation}' failed after {attempts} attempts: {last_error}")]
    #[diagnostic(code(memostore::store::retry_exhausted))]
    RetryExhausted {
        /// Operation that was retried
        operation: String,
        /// Number of attempts made
        attempts: usize,
        /// Message of the final error
        last_error: String,
    },
}

impl StoreError {
    /// Create a not found error
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a permission denied error
    #[must_use]
    pub fn permission_denied(
        operation: impl Into<String>,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::PermissionDenied {
            operation: operation.into(),
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create a configuration missing error
    #[must_use]
    pub fn configuration_missing(field: impl Into<String>) -> Self {
        Self::ConfigurationMissing {
            field: field.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create a connection error
    #[must_use]
    pub fn connection(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    #[must_use]
    pub fn http(operation: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            operation: operation.into(),
            status,
            message: message.into(),
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(operation: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            seconds,
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create an invalid key error
    #[must_use]
    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::InvalidKey { key: key.into() }
    }

    /// Create a retry exhausted error
    #[must_use]
    pub fn retry_exhausted(
        operation: impl Into<String>,
        attempts: usize,
        last_error: impl Into<String>,
    ) -> Self {
        Self::RetryExhausted {
            operation: operation.into(),
            attempts,
            last_error: last_error.into(),
        }
    }

    /// Whether this error means the object is simply absent
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
