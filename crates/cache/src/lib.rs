//! Content-addressed call archives for memostore
//!
//! This crate holds the pure half of memoization, with no I/O:
//! - Call signatures (computation identity plus argument values)
//! - Deterministic zip archives of those signatures
//! - Fingerprints: 128-bit digests of the pre-result archive
//! - The codec for the `result` entry appended after a cache miss
//!
//! # Key derivation
//!
//! The fingerprint is computed over the archive *before* the result entry is
//! appended. The stored object therefore hashes differently from its own key:
//! key = inputs only. Changing this would orphan every existing entry.

// TODO(cache-docs): Add # Errors documentation to all fallible public functions
#![expect(
    clippy::missing_errors_doc,
    reason = "Error documentation to be added incrementally"
)]

pub mod archive;
pub mod args;
pub mod codec;
mod error;
pub mod fingerprint;

// Re-export error types at crate root
pub use error::{Error, Result};

// Re-export main types
pub use archive::{
    DeterministicArchive, IDENTITY_ENTRY, RESULT_ENTRY, entry_names, named_entry,
    positional_entry, read_entry,
};
pub use args::{ArgValue, Args, Call, CallArgs, FunctionId, ToArg};
pub use codec::Blob;
pub use fingerprint::{FINGERPRINT_LEN, Fingerprint};
