//! Shared cache context: the store plus the runtime that drives blocking calls

use crate::computation::{BlockingComputation, Memoized, SuspendableComputation};
use crate::error::{Error, Result};
use memostore_cache::FunctionId;
use memostore_remote::{CacheStore, StoreConfig, open_cache_store};
use once_cell::sync::OnceCell;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{info, warn};

/// Everything a memoized computation needs at call time
///
/// Build one per process and share it through `Arc`.
pub struct CacheContext {
    store: CacheStore,
    runtime: OnceCell<Runtime>,
}

impl std::fmt::Debug for CacheContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheContext")
            .field("store", &self.store)
            .field("runtime_started", &self.runtime.get().is_some())
            .finish()
    }
}

impl CacheContext {
    /// Context over an already opened store
    #[must_use]
    pub fn new(store: CacheStore) -> Arc<Self> {
        Arc::new(Self {
            store,
            runtime: OnceCell::new(),
        })
    }

    /// Context over the store selected by `config`
    pub fn from_config(config: &StoreConfig) -> Result<Arc<Self>> {
        Ok(Self::new(open_cache_store(config)?))
    }

    /// Context from a YAML configuration file.
    ///
    /// A missing or malformed file is logged and replaced by defaults.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        Self::from_config(&StoreConfig::load_or_default(path))
    }

    /// The fingerprint-addressed store
    #[must_use]
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Provision the store namespace.
    ///
    /// Failure is logged and otherwise ignored; caching then degrades to
    /// per-call store errors. Returns whether provisioning succeeded.
    pub async fn bootstrap(&self) -> bool {
        match self.store.ensure_namespace().await {
            Ok(()) => {
                info!(backend = self.store.backend_name(), "Cache store ready");
                true
            }
            Err(e) => {
                warn!(
                    backend = self.store.backend_name(),
                    error = %e,
                    "Cache store provisioning failed; continuing"
                );
                false
            }
        }
    }

    /// [`Self::bootstrap`] for callers without a runtime
    pub fn bootstrap_blocking(&self) -> bool {
        match self.block_on(self.bootstrap()) {
            Ok(ready) => ready,
            Err(e) => {
                warn!(error = %e, "Cache store provisioning skipped");
                false
            }
        }
    }

    /// Memoize a blocking computation `Fn(A) -> Result<T, E>`
    pub fn wrap_blocking<F>(
        self: &Arc<Self>,
        id: FunctionId,
        f: F,
    ) -> Memoized<BlockingComputation<F>> {
        Memoized::new(Arc::clone(self), id, BlockingComputation::new(f))
    }

    /// Memoize an async computation `Fn(A) -> impl Future<Output = Result<T, E>>`
    pub fn wrap_async<F>(
        self: &Arc<Self>,
        id: FunctionId,
        f: F,
    ) -> Memoized<SuspendableComputation<F>> {
        Memoized::new(Arc::clone(self), id, SuspendableComputation::new(f))
    }

    fn runtime(&self) -> Result<&Runtime> {
        self.runtime.get_or_try_init(|| {
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .thread_name("memostore-io")
                .enable_all()
                .build()
                .map_err(|e| Error::configuration(format!("Failed to start I/O runtime: {e}")))
        })
    }

    /// Drive `future` to completion on the calling thread.
    ///
    /// I/O and timers are serviced by the context's own runtime, so this
    /// works from plain threads and from inside another async runtime alike.
    pub(crate) fn block_on<F: Future>(&self, future: F) -> Result<F::Output> {
        let runtime = self.runtime()?;
        let _guard = runtime.enter();
        Ok(futures::executor::block_on(future))
    }
}

impl Drop for CacheContext {
    fn drop(&mut self) {
        // Dropping a runtime from async context panics; shutting down in the
        // background does not.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
