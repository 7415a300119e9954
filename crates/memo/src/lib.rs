//! Content-addressed memoization backed by a remote object store
//!
//! Wrap a computation once with a stable [`FunctionId`]; every call is then
//! archived deterministically, fingerprinted, and looked up in the store
//! before the computation runs.
//!
//! ```no_run
//! use memostore::{CacheContext, Error, FunctionId};
//!
//! # fn main() -> Result<(), Error> {
//! let ctx = CacheContext::from_config_file("local/cloud_storage.yaml")?;
//! ctx.bootstrap_blocking();
//!
//! let poly = ctx.wrap_blocking(FunctionId::new("poly", "v1"), |(x, y): (i64, i64)| {
//!     Ok::<_, Error>(x * y + x * x - y * y)
//! });
//! assert_eq!(poly.call((3, 4))?, 5);
//! # Ok(())
//! # }
//! ```
//!
//! Store faults never change what a caller receives: a failed lookup runs
//! the computation, and a failed write still returns the computed value.
//! Use `call_traced` to observe those faults.

// TODO(memo-docs): Add # Errors documentation to all fallible public functions
#![expect(
    clippy::missing_errors_doc,
    reason = "Error documentation to be added incrementally"
)]

mod computation;
mod context;
mod error;
mod invoke;

pub use computation::{BlockingComputation, Memoized, SuspendableComputation};
pub use context::CacheContext;
pub use error::{Error, Result};
pub use invoke::{CacheOutcome, Traced};

pub use memostore_cache::{ArgValue, Args, Blob, CallArgs, Fingerprint, FunctionId, ToArg};
pub use memostore_remote::{CacheStore, StoreConfig, StoreError};
