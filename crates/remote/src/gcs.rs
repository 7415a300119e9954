//! Google Cloud Storage backend over the JSON API
//!
//! Object names are sent as single percent-encoded path segments, so a key
//! like `cache/abc.zip` travels as `cache%2Fabc.zip`.

use crate::config::{RetryConfig, StoreConfig};
use crate::credentials::{Credentials, TokenSource, resolve_credentials};
use crate::error::{Result, StoreError};
use crate::retry::retry_with_backoff;
use crate::store::ObjectStore;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, info};

/// Object store backed by a Cloud Storage bucket
pub struct GcsStore {
    client: Client,
    endpoint: Url,
    bucket: Option<String>,
    project: Option<String>,
    auth: TokenSource,
    timeout_secs: u64,
    retry: RetryConfig,
}

impl std::fmt::Debug for GcsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsStore")
            .field("endpoint", &self.endpoint.as_str())
            .field("bucket", &self.bucket)
            .field("project", &self.project)
            .field("credentials", &self.auth.kind())
            .finish_non_exhaustive()
    }
}

impl GcsStore {
    /// Build a store from configuration.
    ///
    /// A missing bucket is not an error here; every operation reports
    /// [`StoreError::ConfigurationMissing`] instead.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let credentials = resolve_credentials(config.credentials_path.as_deref());
        Self::with_credentials(config, credentials)
    }

    /// Build a store with an explicit bearer token
    pub fn with_token(config: &StoreConfig, token: Option<SecretString>) -> Result<Self> {
        let credentials = token.map_or(Credentials::Anonymous, Credentials::AccessToken);
        Self::with_credentials(config, credentials)
    }

    /// Build a store with explicit credentials
    pub fn with_credentials(config: &StoreConfig, credentials: Credentials) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            StoreError::configuration(format!("Invalid endpoint '{}': {e}", config.endpoint))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(StoreError::configuration(format!(
                "Endpoint '{}' cannot carry a path",
                config.endpoint
            )));
        }
        let client = Client::builder()
            .user_agent(concat!("memostore/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            auth: TokenSource::new(credentials, client.clone()),
            client,
            endpoint,
            bucket: config.bucket_name.clone().filter(|b| !b.is_empty()),
            project: config.project.clone(),
            timeout_secs: config.timeout_secs,
            retry: config.retry.clone(),
        })
    }

    fn bucket(&self) -> Result<&str> {
        self.bucket
            .as_deref()
            .ok_or_else(|| StoreError::configuration_missing("bucket_name"))
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn object_url(&self, bucket: &str, key: &str) -> Url {
        self.url(&["storage", "v1", "b", bucket, "o", key])
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match self.auth.token().await? {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        })
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> Result<Response> {
        self.authorize(request).await?.send().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::timeout(operation, self.timeout_secs)
            } else {
                StoreError::connection(operation, e.to_string())
            }
        })
    }

    async fn metadata_status(&self, operation: &str, url: Url) -> Result<StatusCode> {
        let response = self.send(self.client.get(url), operation).await?;
        Ok(response.status())
    }
}

/// Map a non-success response onto a store error
async fn check(response: Response, operation: &str, target: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(status_error(status, operation, target, message))
}

fn status_error(status: StatusCode, operation: &str, target: &str, message: String) -> StoreError {
    match status {
        StatusCode::NOT_FOUND => StoreError::not_found(target),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StoreError::permission_denied(operation, target, message)
        }
        other => StoreError::http(operation, other.as_u16(), message),
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    fn name(&self) -> &'static str {
        "gcs"
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let bucket = self.bucket()?;
        let url = self.object_url(bucket, key);
        retry_with_backoff(&self.retry, "gcs exists", move || {
            let url = url.clone();
            async move {
                match self.metadata_status("exists", url).await? {
                    s if s.is_success() => Ok(true),
                    StatusCode::NOT_FOUND => Ok(false),
                    other => Err(status_error(other, "exists", key, String::new())),
                }
            }
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let bucket = self.bucket()?;
        let mut url = self.object_url(bucket, key);
        url.query_pairs_mut().append_pair("alt", "media");

        retry_with_backoff(&self.retry, "gcs get", move || {
            let url = url.clone();
            async move {
                let response = self.send(self.client.get(url), "get").await?;
                let response = check(response, "get", key).await?;
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| StoreError::connection("get", e.to_string()))?;
                debug!(bucket, key, bytes = body.len(), "Fetched object");
                Ok(body.to_vec())
            }
        })
        .await
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        let bucket = self.bucket()?;
        let mut url = self.url(&["upload", "storage", "v1", "b", bucket, "o"]);
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);

        retry_with_backoff(&self.retry, "gcs put", move || {
            let url = url.clone();
            let body = body.clone();
            async move {
                let size = body.len();
                let request = self
                    .client
                    .post(url)
                    .header(reqwest::header::CONTENT_TYPE, content_type)
                    .body(body);
                let response = self.send(request, "put").await?;
                check(response, "put", key).await?;
                debug!(bucket, key, bytes = size, "Uploaded object");
                Ok(())
            }
        })
        .await
    }

    async fn ensure_namespace(&self) -> Result<()> {
        let bucket = self.bucket()?;
        let bucket_url = self.url(&["storage", "v1", "b", bucket]);

        let status = retry_with_backoff(&self.retry, "gcs bucket lookup", move || {
            let url = bucket_url.clone();
            async move {
                let status = self.metadata_status("bucket lookup", url).await?;
                if status.is_success() || status == StatusCode::NOT_FOUND {
                    Ok(status)
                } else {
                    Err(status_error(status, "bucket lookup", bucket, String::new()))
                }
            }
        })
        .await?;

        if status.is_success() {
            debug!(bucket, "Bucket already exists");
            return Ok(());
        }

        let project = self
            .project
            .as_deref()
            .ok_or_else(|| StoreError::configuration_missing("project"))?;
        let mut create_url = self.url(&["storage", "v1", "b"]);
        create_url.query_pairs_mut().append_pair("project", project);
        let payload = serde_json::json!({ "name": bucket });

        let response = self
            .send(self.client.post(create_url).json(&payload), "create bucket")
            .await?;
        if response.status() == StatusCode::CONFLICT {
            debug!(bucket, "Bucket created concurrently");
            return Ok(());
        }
        check(response, "create bucket", bucket).await?;
        info!(bucket, project, "Created bucket");
        Ok(())
    }
}
