use crate::error::{ChatError, Result};
use std::future::Future;
use std::time::Duration;

pub const INITIAL_RETRY_DELAY_MS: u64 = 500;
const JITTER_FACTOR: f64 = 0.3; // Add 0-30% random jitter

pub async fn check_response_status(response: reqwest::Response) -> Result<reqwest::Response> {
    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        tracing::error!(
            status = %status,
            error = %error_text,
            "Chat service request failed"
        );
        return Err(ChatError::Api(format!(
            "request failed with status {}: {}",
            status, error_text
        )));
    }
    Ok(response)
}

pub fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.status().is_some_and(|s| s.is_server_error())
}

/// Run an idempotent request with retries and exponential backoff with jitter.
/// Returns the result of the operation or the last error after all retries exhausted.
pub async fn with_retries<F, Fut, T>(
    operation_name: &str,
    max_retries: u32,
    operation: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, reqwest::Error>>,
{
    let mut retry_delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let is_retryable = is_retryable_error(&e);

                if attempt < max_retries && is_retryable {
                    attempt += 1;

                    // Add jitter to prevent thundering herd
                    let jitter = rand::random::<f64>() * JITTER_FACTOR;
                    let jittered_delay = retry_delay.mul_f64(1.0 + jitter);

                    tracing::warn!(
                        operation = operation_name,
                        attempt = attempt,
                        max_retries = max_retries,
                        delay_ms = jittered_delay.as_millis() as u64,
                        error = %e,
                        "Retrying request"
                    );

                    tokio::time::sleep(jittered_delay).await;
                    retry_delay *= 2;
                    continue;
                }

                tracing::error!(
                    operation = operation_name,
                    attempts = attempt + 1,
                    error = %e,
                    retryable = is_retryable,
                    "Request failed permanently"
                );

                if is_retryable {
                    return Err(ChatError::NetworkError(format!(
                        "{} failed after {} attempts: {}",
                        operation_name,
                        attempt + 1,
                        e
                    )));
                }
                return Err(ChatError::Http(e));
            }
        }
    }
}
