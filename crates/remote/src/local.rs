//! Filesystem object store
//!
//! Objects live at `<root>/<key>`. Writes go to a uniquely named temp file in
//! the destination directory and are renamed into place, so readers never
//! observe a partially written entry.

use crate::error::{Result, StoreError};
use crate::store::ObjectStore;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the local cache root
pub const CACHE_DIR_ENV: &str = "MEMOSTORE_CACHE_DIR";

/// Object store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Store rooted at an explicit directory
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at the first writable default cache directory
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(default_root()?))
    }

    /// Root directory of this store
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for a key; rejects keys that would escape the root
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StoreError::invalid_key(key));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::io(e, &path, "stat"))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(body) => Ok(body),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::not_found(key)),
            Err(e) => Err(StoreError::io(e, &path, "read")),
        }
    }

    async fn put(&self, key: &str, body: Vec<u8>, _content_type: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let parent = path.parent().unwrap_or(&self.root).to_path_buf();
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|e| StoreError::io(e, &parent, "create_dir_all"))?;

        let tmp = parent.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| StoreError::io(e, &tmp, "write"))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StoreError::io(e, &path, "rename"));
        }
        debug!(key, path = %path.display(), bytes = body.len(), "Stored object");
        Ok(())
    }

    async fn ensure_namespace(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StoreError::io(e, &self.root, "create_dir_all"))
    }
}

/// Directories tried, in order, for the default store root.
///
/// The OS cache directory already honors `XDG_CACHE_HOME` on Linux.
fn root_candidates(
    override_dir: Option<PathBuf>,
    os_cache_dir: Option<PathBuf>,
    temp_dir: &Path,
) -> Vec<PathBuf> {
    override_dir
        .into_iter()
        .chain(os_cache_dir.map(|dir| dir.join("memostore")))
        .chain(std::iter::once(temp_dir.join("memostore")))
        .collect()
}

/// Create `dir` if needed and check that files can be written into it
fn is_usable_root(dir: &Path) -> bool {
    if std::fs::create_dir_all(dir).is_err() {
        return false;
    }
    let marker = dir.join(format!(".{}.probe", uuid::Uuid::new_v4()));
    let writable = std::fs::write(&marker, b"").is_ok();
    if writable {
        let _ = std::fs::remove_file(&marker);
    }
    writable
}

fn default_root() -> Result<PathBuf> {
    let override_dir = std::env::var_os(CACHE_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    let candidates = root_candidates(override_dir, dirs::cache_dir(), &std::env::temp_dir());
    let root = candidates
        .iter()
        .find(|dir| is_usable_root(dir))
        .cloned()
        .ok_or_else(|| {
            StoreError::configuration(format!(
                "No writable cache directory among {}",
                candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;
    debug!(root = %root.display(), "Resolved local store root");
    Ok(root)
}
