//! Memoized computations in their two calling conventions
//!
//! The convention is fixed when the computation is wrapped: a
//! [`BlockingComputation`] is called synchronously and returns `Result<T, E>`,
//! a [`SuspendableComputation`] is awaited. Callers see the same signature
//! they would see without the cache.

use crate::context::CacheContext;
use crate::error::Error;
use crate::invoke::{Lookup, Traced, find_cached, memoize, persist};
use memostore_cache::{Call, CallArgs, FunctionId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;

/// A computation that runs to completion on the calling thread
#[derive(Debug, Clone)]
pub struct BlockingComputation<F> {
    f: F,
}

impl<F> BlockingComputation<F> {
    pub(crate) const fn new(f: F) -> Self {
        Self { f }
    }
}

/// A computation that yields a future
#[derive(Debug, Clone)]
pub struct SuspendableComputation<F> {
    f: F,
}

impl<F> SuspendableComputation<F> {
    pub(crate) const fn new(f: F) -> Self {
        Self { f }
    }
}

/// A computation bound to a cache context and a stable identity
#[derive(Debug, Clone)]
pub struct Memoized<C> {
    context: Arc<CacheContext>,
    id: FunctionId,
    computation: C,
}

impl<C> Memoized<C> {
    pub(crate) const fn new(context: Arc<CacheContext>, id: FunctionId, computation: C) -> Self {
        Self {
            context,
            id,
            computation,
        }
    }

    /// Identity written into every archive of this computation
    #[must_use]
    pub fn id(&self) -> &FunctionId {
        &self.id
    }

    fn call_for<A: CallArgs>(&self, args: &A) -> Call {
        Call::new(self.id.clone(), args.to_args())
    }
}

impl<F> Memoized<BlockingComputation<F>> {
    /// Call through the cache
    pub fn call<A, T, E>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Result<T, E>,
        A: CallArgs,
        T: Serialize + DeserializeOwned,
        E: From<Error>,
    {
        self.call_traced(args).map(|traced| traced.value)
    }

    /// Call through the cache, reporting what the cache did
    pub fn call_traced<A, T, E>(&self, args: A) -> Result<Traced<T>, E>
    where
        F: Fn(A) -> Result<T, E>,
        A: CallArgs,
        T: Serialize + DeserializeOwned,
        E: From<Error>,
    {
        let call = self.call_for(&args);
        let store = self.context.store();

        let found = self
            .context
            .block_on(find_cached::<T>(store, &call))
            .and_then(|found| found)
            .map_err(E::from)?;
        let pending = match found {
            Lookup::Hit(traced) => return Ok(traced),
            Lookup::Miss(pending) => pending,
        };

        // Runs outside the executor: the computation may block or call
        // other blocking memoized computations.
        let value = (self.computation.f)(args)?;

        self.context
            .block_on(persist(store, pending, value))
            .and_then(|stored| stored)
            .map_err(E::from)
    }
}

impl<F> Memoized<SuspendableComputation<F>> {
    /// Await the computation through the cache.
    ///
    /// Store I/O runs on the caller's Tokio runtime.
    pub async fn call<A, T, E, Fut>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        A: CallArgs,
        T: Serialize + DeserializeOwned,
        E: From<Error>,
    {
        self.call_traced(args).await.map(|traced| traced.value)
    }

    /// Await the computation through the cache, reporting what the cache did
    pub async fn call_traced<A, T, E, Fut>(&self, args: A) -> Result<Traced<T>, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        A: CallArgs,
        T: Serialize + DeserializeOwned,
        E: From<Error>,
    {
        let call = self.call_for(&args);
        let f = &self.computation.f;
        memoize(self.context.store(), call, move || f(args)).await
    }
}
