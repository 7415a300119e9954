//! Credential resolution and bearer tokens for Cloud Storage requests
//!
//! Credentials come from the first source that yields something usable:
//! 1. the configured `credentials_path`
//! 2. the `MEMOSTORE_ACCESS_TOKEN` environment variable
//! 3. the file named by `GOOGLE_APPLICATION_CREDENTIALS`
//!
//! A credentials file holds a pre-minted token (a JSON object with an
//! `access_token` field, or the bare token text) or a service-account key.
//! Service-account keys are exchanged for short-lived access tokens with a
//! signed JWT assertion; the token is cached until shortly before it expires.

use crate::error::{Result, StoreError};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Environment variable holding a pre-minted access token
pub const ACCESS_TOKEN_ENV: &str = "MEMOSTORE_ACCESS_TOKEN";

/// Environment variable naming an application credentials file
pub const APPLICATION_CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// OAuth endpoint used when a key file does not name one
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Scope requested for exchanged tokens
pub const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;
const REFRESH_MARGIN: Duration = Duration::from_secs(60);
const MAX_TOKEN_LIFETIME_SECS: u64 = 24 * 3600;

/// A service-account key as issued by Cloud IAM
#[derive(Debug)]
pub struct ServiceAccountKey {
    /// Account identity, used as the assertion issuer
    pub client_email: String,
    /// PEM-encoded RSA private key
    pub private_key: SecretString,
    /// Key id, sent as the JWT `kid` header when present
    pub private_key_id: Option<String>,
    /// OAuth token endpoint
    pub token_uri: String,
}

/// Where store request tokens come from
#[derive(Debug)]
pub enum Credentials {
    /// A pre-minted bearer token sent as is
    AccessToken(SecretString),
    /// A key exchanged for access tokens on demand
    ServiceAccount(ServiceAccountKey),
    /// No credentials; requests go out unauthenticated
    Anonymous,
}

impl Credentials {
    /// Short name for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AccessToken(_) => "access_token",
            Self::ServiceAccount(_) => "service_account",
            Self::Anonymous => "anonymous",
        }
    }
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    client_email: Option<String>,
    #[serde(default)]
    private_key: Option<String>,
    #[serde(default)]
    private_key_id: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
}

/// Resolve credentials for store requests.
///
/// Unreadable or unusable sources are logged and skipped; with nothing
/// usable the result is [`Credentials::Anonymous`].
#[must_use]
pub fn resolve_credentials(credentials_path: Option<&Path>) -> Credentials {
    if let Some(credentials) = credentials_path.and_then(credentials_from_file) {
        return credentials;
    }

    if let Some(token) = std::env::var(ACCESS_TOKEN_ENV)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
    {
        debug!(env = ACCESS_TOKEN_ENV, "Using access token from environment");
        return Credentials::AccessToken(SecretString::from(token));
    }

    std::env::var_os(APPLICATION_CREDENTIALS_ENV)
        .filter(|v| !v.is_empty())
        .and_then(|path| credentials_from_file(Path::new(&path)))
        .unwrap_or(Credentials::Anonymous)
}

fn credentials_from_file(path: &Path) -> Option<Credentials> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let credentials = credentials_from_text(&text, path)?;
            debug!(
                path = %path.display(),
                kind = credentials.kind(),
                "Loaded credentials file"
            );
            Some(credentials)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Credentials file unreadable");
            None
        }
    }
}

fn credentials_from_text(text: &str, path: &Path) -> Option<Credentials> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if !trimmed.starts_with('{') {
        return Some(Credentials::AccessToken(SecretString::from(
            trimmed.to_string(),
        )));
    }
    let file = match serde_json::from_str::<CredentialsFile>(trimmed) {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Credentials file is not valid JSON");
            return None;
        }
    };

    if let Some(token) = file.access_token.filter(|t| !t.is_empty()) {
        return Some(Credentials::AccessToken(SecretString::from(token)));
    }
    match (file.kind.as_deref(), file.client_email, file.private_key) {
        (Some("service_account"), Some(client_email), Some(private_key)) => {
            Some(Credentials::ServiceAccount(ServiceAccountKey {
                client_email,
                private_key: SecretString::from(private_key),
                private_key_id: file.private_key_id.filter(|id| !id.is_empty()),
                token_uri: file
                    .token_uri
                    .filter(|uri| !uri.is_empty())
                    .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            }))
        }
        _ => {
            warn!(
                path = %path.display(),
                kind = file.kind.as_deref().unwrap_or("unknown"),
                "Credentials file has neither an access token nor a service-account key"
            );
            None
        }
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

const fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS
}

/// Build the signed JWT assertion for a service-account token exchange
fn sign_assertion(key: &ServiceAccountKey, issued_at: u64) -> Result<String> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid.clone_from(&key.private_key_id);
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: STORAGE_SCOPE,
        aud: &key.token_uri,
        iat: issued_at,
        exp: issued_at + ASSERTION_LIFETIME_SECS,
    };
    let signing_key = EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())
        .map_err(|e| {
            StoreError::configuration(format!("Invalid service-account private key: {e}"))
        })?;
    encode(&header, &claims, &signing_key)
        .map_err(|e| StoreError::configuration(format!("Failed to sign token assertion: {e}")))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

struct CachedToken {
    token: SecretString,
    refresh_at: Instant,
}

/// Supplies bearer tokens for store requests
pub struct TokenSource {
    credentials: Credentials,
    client: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSource")
            .field("credentials", &self.credentials.kind())
            .finish_non_exhaustive()
    }
}

impl TokenSource {
    /// Token source over `credentials`, exchanging through `client`
    #[must_use]
    pub fn new(credentials: Credentials, client: Client) -> Self {
        Self {
            credentials,
            client,
            cached: Mutex::new(None),
        }
    }

    /// Kind of the underlying credentials
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.credentials.kind()
    }

    /// Bearer token for the next request, or `None` when anonymous
    pub async fn token(&self) -> Result<Option<SecretString>> {
        match &self.credentials {
            Credentials::Anonymous => Ok(None),
            Credentials::AccessToken(token) => Ok(Some(SecretString::from(
                token.expose_secret().to_owned(),
            ))),
            Credentials::ServiceAccount(key) => {
                let mut cached = self.cached.lock().await;
                if let Some(current) = cached.as_ref().filter(|c| Instant::now() < c.refresh_at) {
                    return Ok(Some(SecretString::from(
                        current.token.expose_secret().to_owned(),
                    )));
                }
                let fresh = self.exchange(key).await?;
                let token = SecretString::from(fresh.token.expose_secret().to_owned());
                *cached = Some(fresh);
                Ok(Some(token))
            }
        }
    }

    async fn exchange(&self, key: &ServiceAccountKey) -> Result<CachedToken> {
        let operation = "token exchange";
        let assertion = sign_assertion(key, unix_now())?;
        let response = self
            .client
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| StoreError::connection(operation, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(if status.is_server_error() {
                StoreError::http(operation, status.as_u16(), message)
            } else {
                StoreError::permission_denied(operation, &key.client_email, message)
            });
        }
        let body: TokenResponse = response.json().await.map_err(|e| {
            StoreError::connection(operation, format!("Malformed token response: {e}"))
        })?;

        let lifetime = Duration::from_secs(body.expires_in.min(MAX_TOKEN_LIFETIME_SECS));
        debug!(
            account = %key.client_email,
            expires_in = lifetime.as_secs(),
            "Exchanged service-account key for access token"
        );
        Ok(CachedToken {
            token: SecretString::from(body.access_token),
            refresh_at: Instant::now() + lifetime.saturating_sub(REFRESH_MARGIN),
        })
    }
}
