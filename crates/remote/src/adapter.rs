//! Fingerprint-addressed view of an object store

use crate::error::{Result, StoreError};
use crate::store::ObjectStore;
use memostore_cache::Fingerprint;
use std::sync::Arc;
use tracing::debug;

/// Content type of stored cache entries
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Cache entries keyed by fingerprint under a fixed prefix
#[derive(Clone)]
pub struct CacheStore {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("backend", &self.store.name())
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl CacheStore {
    /// Wrap an object store, placing entries under `prefix`
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// Wrap an object store using the default `cache` prefix
    pub fn with_default_prefix(store: Arc<dyn ObjectStore>) -> Self {
        Self::new(store, crate::DEFAULT_PREFIX)
    }

    /// Object key of the entry for `fingerprint`
    #[must_use]
    pub fn key_for(&self, fingerprint: &Fingerprint) -> String {
        fingerprint.object_key(&self.prefix)
    }

    /// Name of the underlying backend
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.store.name()
    }

    /// Whether an entry exists
    pub async fn exists(&self, fingerprint: &Fingerprint) -> Result<bool> {
        self.store.exists(&self.key_for(fingerprint)).await
    }

    /// Fetch an entry; [`StoreError::NotFound`] when absent
    pub async fn fetch(&self, fingerprint: &Fingerprint) -> Result<Vec<u8>> {
        self.store.get(&self.key_for(fingerprint)).await
    }

    /// Fetch an entry, mapping absence to `None`
    pub async fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<Vec<u8>>> {
        match self.fetch(fingerprint).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Persist an entry. Re-storing the same fingerprint is harmless.
    pub async fn store(&self, fingerprint: &Fingerprint, archive: Vec<u8>) -> Result<()> {
        let key = self.key_for(fingerprint);
        let size = archive.len();
        self.store.put(&key, archive, ARCHIVE_CONTENT_TYPE).await?;
        debug!(
            backend = self.store.name(),
            key = %key,
            bytes = size,
            "Stored cache entry"
        );
        Ok(())
    }

    /// Provision the backing namespace
    pub async fn ensure_namespace(&self) -> Result<()> {
        self.store.ensure_namespace().await
    }
}
