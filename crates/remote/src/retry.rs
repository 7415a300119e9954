//! Retry logic with exponential backoff for store operations

use crate::config::RetryConfig;
use crate::error::{Result, StoreError};
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder, backoff::Backoff};
use std::time::Duration;
use tracing::{debug, warn};

/// Retry a fallible async operation with exponential backoff
///
/// Errors that are not transient are returned as-is on the first attempt.
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut backoff = create_backoff(config);
    let mut attempts = 0;

    loop {
        attempts += 1;

        match f().await {
            Ok(result) => {
                if attempts > 1 {
                    debug!(
                        operation = operation_name,
                        attempts = attempts,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_retryable(&err) {
                    debug!(
                        operation = operation_name,
                        error = %err,
                        "Error is not retryable, failing immediately"
                    );
                    return Err(err);
                }

                if attempts >= config.max_attempts {
                    warn!(
                        operation = operation_name,
                        attempts = attempts,
                        error = %err,
                        "Operation failed after maximum retries"
                    );
                    return Err(StoreError::retry_exhausted(
                        operation_name,
                        attempts,
                        err.to_string(),
                    ));
                }

                if let Some(duration) = backoff.next_backoff() {
                    warn!(
                        operation = operation_name,
                        attempts = attempts,
                        error = %err,
                        retry_in_ms = duration.as_millis(),
                        "Operation failed, retrying"
                    );
                    tokio::time::sleep(duration).await;
                } else {
                    return Err(StoreError::retry_exhausted(
                        operation_name,
                        attempts,
                        err.to_string(),
                    ));
                }
            }
        }
    }
}

/// Create exponential backoff from config
fn create_backoff(config: &RetryConfig) -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(config.initial_backoff_ms))
        .with_max_interval(Duration::from_millis(config.max_backoff_ms))
        .with_multiplier(config.backoff_multiplier)
        .with_max_elapsed_time(None) // We use max_attempts instead
        .build()
}

/// Determine if an error is transient
pub fn is_retryable(err: &StoreError) -> bool {
    match err {
        StoreError::Connection { .. } | StoreError::Timeout { .. } => true,

        // Server-side faults and throttling
        StoreError::Http { status, .. } => *status >= 500 || *status == 429,

        StoreError::NotFound { .. }
        | StoreError::PermissionDenied { .. }
        | StoreError::ConfigurationMissing { .. }
        | StoreError::Configuration { .. }
        | StoreError::ConfigParse { .. }
        | StoreError::Io { .. }
        | StoreError::InvalidKey { .. }
        | StoreError::RetryExhausted { .. } => false,
    }
}
