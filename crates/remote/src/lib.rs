//! Object store adapters for memostore cache entries
//!
//! Cache entries are opaque archives stored under `<prefix>/<fingerprint>.zip`.
//! Three backends implement [`ObjectStore`]:
//! - [`GcsStore`]: a Cloud Storage bucket over the JSON API
//! - [`LocalStore`]: a directory tree with atomic writes
//! - [`MemoryStore`]: a process-local map for tests and demos
//!
//! [`CacheStore`] layers fingerprint addressing on top of any of them.

pub mod adapter;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gcs;
pub mod local;
pub mod memory;
pub mod retry;
pub mod store;

pub use adapter::{ARCHIVE_CONTENT_TYPE, CacheStore};
pub use config::{BackendKind, DEFAULT_CONFIG_PATH, RetryConfig, StoreConfig};
pub use error::{Result, StoreError};
pub use gcs::GcsStore;
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use store::ObjectStore;

use std::sync::Arc;

/// Default key prefix for cache entries
pub const DEFAULT_PREFIX: &str = "cache";

/// Open the object store selected by `config`
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config.backend {
        BackendKind::Gcs => Arc::new(GcsStore::from_config(config)?),
        BackendKind::Local => match &config.local_root {
            Some(root) => Arc::new(LocalStore::new(root)),
            None => Arc::new(LocalStore::from_env()?),
        },
        BackendKind::Memory => Arc::new(MemoryStore::new()),
    };
    tracing::debug!(backend = store.name(), "Opened object store");
    Ok(store)
}

/// Open the configured store wrapped for fingerprint addressing
pub fn open_cache_store(config: &StoreConfig) -> Result<CacheStore> {
    Ok(CacheStore::new(open_store(config)?, config.prefix.clone()))
}
