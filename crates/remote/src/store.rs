//! Object store abstraction shared by every backend

use crate::error::Result;
use async_trait::async_trait;

/// A flat namespace of byte objects addressed by string keys
///
/// Keys use `/` as a separator (for example `cache/<fingerprint>.zip`).
/// Implementations must be safe to share across threads and tasks.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Whether an object exists, without transferring its body
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Fetch an object body; [`crate::StoreError::NotFound`] when absent
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Write an object, replacing any previous body under the same key
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()>;

    /// Make sure the namespace (bucket, directory) exists
    async fn ensure_namespace(&self) -> Result<()>;
}
