//! The per-invocation state machine shared by both calling conventions
//!
//! Build → Fingerprint → Lookup → (hit: decode, return) → Invoke → Persist →
//! Return. Lookup and Persist are shared; Invoke is owned by the caller.
//! Async computations are awaited between the two halves, blocking ones run
//! on the caller's thread outside any executor so they may themselves call
//! other memoized computations.

use crate::error::Error;
use memostore_cache::{Call, DeterministicArchive, Fingerprint, FunctionId, RESULT_ENTRY, codec};
use memostore_remote::{CacheStore, StoreError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use tracing::{debug, error, warn};

/// What the cache did for one invocation
#[derive(Debug)]
pub enum CacheOutcome {
    /// The result came from the store; the computation did not run
    Hit,
    /// The computation ran and its result was persisted
    Stored,
    /// The computation ran but persisting the result failed
    StoreFailed(StoreError),
    /// The store could not be read, so the computation ran uncached
    Bypassed(StoreError),
}

impl CacheOutcome {
    /// Whether the value was served from the store
    #[must_use]
    pub const fn is_hit(&self) -> bool {
        matches!(self, Self::Hit)
    }

    /// The store fault absorbed during this invocation, if any
    #[must_use]
    pub const fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::StoreFailed(e) | Self::Bypassed(e) => Some(e),
            Self::Hit | Self::Stored => None,
        }
    }
}

/// A computed value together with how the cache produced it
#[derive(Debug)]
pub struct Traced<T> {
    /// The computation's result
    pub value: T,
    /// Key the invocation was looked up under
    pub fingerprint: Fingerprint,
    /// Cache behavior for this invocation
    pub outcome: CacheOutcome,
}

fn decode_entry<T: DeserializeOwned>(archive: &[u8]) -> memostore_cache::Result<T> {
    let encoded = memostore_cache::read_entry(archive, RESULT_ENTRY)?;
    codec::decode(&encoded)
}

/// State carried from a missed lookup to the persist step
#[derive(Debug)]
pub(crate) struct Pending {
    function: FunctionId,
    archive: DeterministicArchive,
    fingerprint: Fingerprint,
    read_fault: Option<StoreError>,
}

/// Result of the lookup half of an invocation
#[derive(Debug)]
pub(crate) enum Lookup<T> {
    Hit(Traced<T>),
    Miss(Pending),
}

/// Build, fingerprint and look up a call.
///
/// Archive failures are returned before any store I/O. Store faults are
/// absorbed: an unreadable entry is a miss, a failed read is a miss that
/// will not be persisted.
pub(crate) async fn find_cached<T: DeserializeOwned>(
    store: &CacheStore,
    call: &Call,
) -> Result<Lookup<T>, Error> {
    let function = call.function.as_str();
    let archive = DeterministicArchive::build(call)?;
    let fingerprint = Fingerprint::of(archive.as_bytes());

    let mut read_fault = None;
    match store.lookup(&fingerprint).await {
        Ok(Some(bytes)) => match decode_entry::<T>(&bytes) {
            Ok(value) => {
                debug!(function, fingerprint = %fingerprint, "Cache hit");
                return Ok(Lookup::Hit(Traced {
                    value,
                    fingerprint,
                    outcome: CacheOutcome::Hit,
                }));
            }
            Err(e) => {
                // Unreadable entries are recomputed and overwritten
                warn!(
                    function,
                    fingerprint = %fingerprint,
                    error = %e,
                    "Cached entry unreadable, recomputing"
                );
            }
        },
        Ok(None) => {
            debug!(function, fingerprint = %fingerprint, "Cache miss");
        }
        Err(e) => {
            warn!(
                function,
                fingerprint = %fingerprint,
                backend = store.backend_name(),
                error = %e,
                "Cache lookup failed, computing without cache"
            );
            read_fault = Some(e);
        }
    }

    Ok(Lookup::Miss(Pending {
        function: call.function.clone(),
        archive,
        fingerprint,
        read_fault,
    }))
}

/// Append the computed value to the pending archive and upload it.
///
/// A failed upload never replaces the value; it is reported through the
/// outcome.
pub(crate) async fn persist<T: Serialize>(
    store: &CacheStore,
    pending: Pending,
    value: T,
) -> Result<Traced<T>, Error> {
    let Pending {
        function,
        mut archive,
        fingerprint,
        read_fault,
    } = pending;

    if let Some(e) = read_fault {
        return Ok(Traced {
            value,
            fingerprint,
            outcome: CacheOutcome::Bypassed(e),
        });
    }

    let encoded = codec::encode(&value)?;
    archive.append_result(&encoded)?;

    let outcome = match store.store(&fingerprint, archive.into_bytes()).await {
        Ok(()) => {
            debug!(function = function.as_str(), fingerprint = %fingerprint, "Cached result");
            CacheOutcome::Stored
        }
        Err(e) => {
            error!(
                function = function.as_str(),
                fingerprint = %fingerprint,
                backend = store.backend_name(),
                error = %e,
                "Failed to persist result; returning uncached value"
            );
            CacheOutcome::StoreFailed(e)
        }
    };

    Ok(Traced {
        value,
        fingerprint,
        outcome,
    })
}

/// Run one memoized invocation whose computation is a future.
///
/// Upstream errors from `invoke` are returned untouched and nothing is
/// stored. Store faults never replace a computed value: they are logged and
/// reported through [`CacheOutcome`].
pub(crate) async fn memoize<T, E, Fut, I>(
    store: &CacheStore,
    call: Call,
    invoke: I,
) -> std::result::Result<Traced<T>, E>
where
    I: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    T: Serialize + DeserializeOwned,
    E: From<Error>,
{
    let pending = match find_cached::<T>(store, &call).await? {
        Lookup::Hit(traced) => return Ok(traced),
        Lookup::Miss(pending) => pending,
    };
    let value = invoke().await?;
    Ok(persist(store, pending, value).await?)
}
