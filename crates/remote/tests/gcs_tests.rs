//! HTTP-level tests for the Cloud Storage backend against a mock server.

use memostore_remote::credentials::{Credentials, ServiceAccountKey};
use memostore_remote::{GcsStore, ObjectStore, RetryConfig, StoreConfig, StoreError};
use secrecy::SecretString;
use wiremock::matchers::{
    body_bytes, body_json, body_string_contains, header, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OBJECT_PATH: &str = "/storage/v1/b/memo-bucket/o/cache%2Fabc.zip";

fn config(server: &MockServer) -> StoreConfig {
    StoreConfig {
        bucket_name: Some("memo-bucket".to_string()),
        project: Some("memo-project".to_string()),
        endpoint: server.uri(),
        timeout_secs: 5,
        retry: RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            backoff_multiplier: 2.0,
        },
        ..StoreConfig::default()
    }
}

fn store(server: &MockServer) -> GcsStore {
    GcsStore::with_token(
        &config(server),
        Some(SecretString::from("test-token".to_string())),
    )
    .unwrap()
}

#[tokio::test]
async fn get_downloads_media_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(OBJECT_PATH))
        .and(query_param("alt", "media"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK-archive".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let body = store(&server).get("cache/abc.zip").await.unwrap();
    assert_eq!(body, b"PK-archive");
}

#[tokio::test]
async fn missing_object_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(OBJECT_PATH))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = store(&server).get("cache/abc.zip").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn exists_checks_metadata_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(OBJECT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "cache/abc.zip",
            "size": "10"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/memo-bucket/o/cache%2Fother.zip"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let gcs = store(&server);
    assert!(gcs.exists("cache/abc.zip").await.unwrap());
    assert!(!gcs.exists("cache/other.zip").await.unwrap());
}

#[tokio::test]
async fn put_uploads_media_with_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/memo-bucket/o"))
        .and(query_param("uploadType", "media"))
        .and(query_param("name", "cache/abc.zip"))
        .and(header("content-type", "application/zip"))
        .and(body_bytes(b"PK-archive".to_vec()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "cache/abc.zip"
        })))
        .expect(1)
        .mount(&server)
        .await;

    store(&server)
        .put("cache/abc.zip", b"PK-archive".to_vec(), "application/zip")
        .await
        .unwrap();
}

#[tokio::test]
async fn forbidden_upload_is_permission_denied() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/memo-bucket/o"))
        .respond_with(ResponseTemplate::new(403).set_body_string("caller lacks storage.objects.create"))
        .expect(1)
        .mount(&server)
        .await;

    let err = store(&server)
        .put("cache/abc.zip", b"x".to_vec(), "application/zip")
        .await
        .unwrap_err();
    match err {
        StoreError::PermissionDenied { message, .. } => {
            assert!(message.contains("storage.objects.create"));
        }
        other => panic!("expected PermissionDenied, got {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(OBJECT_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(OBJECT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"late".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(store(&server).get("cache/abc.zip").await.unwrap(), b"late");
}

#[tokio::test]
async fn persistent_server_errors_exhaust_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(OBJECT_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let err = store(&server).get("cache/abc.zip").await.unwrap_err();
    assert!(matches!(err, StoreError::RetryExhausted { attempts: 3, .. }));
}

#[tokio::test]
async fn ensure_namespace_keeps_existing_bucket() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/memo-bucket"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "memo-bucket"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/b"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    store(&server).ensure_namespace().await.unwrap();
}

#[tokio::test]
async fn ensure_namespace_creates_missing_bucket() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/memo-bucket"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/b"))
        .and(query_param("project", "memo-project"))
        .and(body_json(serde_json::json!({ "name": "memo-bucket" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    store(&server).ensure_namespace().await.unwrap();
}

#[tokio::test]
async fn ensure_namespace_without_project_is_configuration_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/memo-bucket"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = StoreConfig {
        project: None,
        ..config(&server)
    };
    let gcs = GcsStore::with_token(&config, None).unwrap();
    assert!(matches!(
        gcs.ensure_namespace().await,
        Err(StoreError::ConfigurationMissing { ref field }) if field == "project"
    ));
}

#[tokio::test]
async fn missing_token_surfaces_as_permission_denied() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(OBJECT_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let gcs = GcsStore::with_token(&config(&server), None).unwrap();
    assert!(matches!(
        gcs.get("cache/abc.zip").await,
        Err(StoreError::PermissionDenied { .. })
    ));
}

fn service_account(server: &MockServer) -> Credentials {
    Credentials::ServiceAccount(ServiceAccountKey {
        client_email: "memo@memo-project.iam.gserviceaccount.com".to_string(),
        private_key: SecretString::from(
            include_str!("fixtures/service_account_key.pem").to_string(),
        ),
        private_key_id: Some("key-1".to_string()),
        token_uri: format!("{}/token", server.uri()),
    })
}

#[tokio::test]
async fn service_account_key_is_exchanged_once_for_a_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .and(body_string_contains("assertion="))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "sa-token",
            "expires_in": 3599,
            "token_type": "Bearer",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(OBJECT_PATH))
        .and(query_param("alt", "media"))
        .and(header("authorization", "Bearer sa-token"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK-archive".to_vec()))
        .expect(2)
        .mount(&server)
        .await;

    let gcs = GcsStore::with_credentials(&config(&server), service_account(&server)).unwrap();
    assert_eq!(gcs.get("cache/abc.zip").await.unwrap(), b"PK-archive");
    assert_eq!(gcs.get("cache/abc.zip").await.unwrap(), b"PK-archive");
}

#[tokio::test]
async fn rejected_token_exchange_is_permission_denied() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(r#"{"error": "invalid_grant"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(OBJECT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let gcs = GcsStore::with_credentials(&config(&server), service_account(&server)).unwrap();
    assert!(matches!(
        gcs.get("cache/abc.zip").await,
        Err(StoreError::PermissionDenied { ref operation, .. }) if operation == "token exchange"
    ));
}
