//! Store configuration loaded from YAML

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default location of the store configuration file
pub const DEFAULT_CONFIG_PATH: &str = "local/cloud_storage.yaml";

/// Default Cloud Storage endpoint
pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Object store backend selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Google Cloud Storage bucket
    #[default]
    Gcs,
    /// Directory on the local filesystem
    Local,
    /// Process-local map, lost on exit
    Memory,
}

/// Configuration for the cache object store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// Which store implementation to open
    #[serde(default)]
    pub backend: BackendKind,

    /// Bucket holding cached entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,

    /// Path to a credentials file: an access token or a service-account key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<PathBuf>,

    /// Project used when the bucket has to be created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Storage API endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Key prefix for cached entries
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Root directory for the local backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_root: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry configuration
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            bucket_name: None,
            credentials_path: None,
            project: None,
            endpoint: default_endpoint(),
            prefix: default_prefix(),
            local_root: None,
            timeout_secs: default_timeout_secs(),
            retry: RetryConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Parse configuration from YAML text
    pub fn from_yaml(text: &str, origin: impl AsRef<Path>) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| StoreError::ConfigParse {
            path: origin.as_ref().to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| StoreError::io(e, path, "read"))?;
        let config = Self::from_yaml(&text, path)?;
        tracing::debug!(
            path = %path.display(),
            backend = ?config.backend,
            bucket = config.bucket_name.as_deref().unwrap_or("<unset>"),
            "Loaded store configuration"
        );
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is
    /// missing or unreadable.
    ///
    /// Defaults leave the bucket unset, so remote operations later fail with
    /// [`StoreError::ConfigurationMissing`] instead of at startup.
    #[must_use]
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Store configuration unavailable, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Bucket name, or a configuration error when unset
    pub fn require_bucket(&self) -> Result<&str> {
        self.bucket_name
            .as_deref()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| StoreError::configuration_missing("bucket_name"))
    }
}

/// Retry configuration with exponential backoff
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Initial backoff duration in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

// Default value functions
fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_prefix() -> String {
    crate::DEFAULT_PREFIX.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_attempts() -> usize {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    10000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}
