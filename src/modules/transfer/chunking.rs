//! Import batch mechanics: chunk splitting and per-chunk retry.

use crate::log_warn;
use crate::shared::errors::{AppError, AppResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Keeps one synchronous import call comfortably inside the HTTP timeout on
/// slow deployments.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Split a batch into `ceil(N / chunk_size)` near-equal chunks, none larger
/// than `chunk_size`. Equal sizing means one failed chunk loses the smallest
/// possible slice of the batch.
pub fn chunk_values<T: Clone>(values: &[T], chunk_size: usize) -> Vec<Vec<T>> {
    if values.is_empty() {
        return Vec::new();
    }
    let chunk_size = chunk_size.max(1);
    let chunk_count = values.len().div_ceil(chunk_size);
    let base = values.len() / chunk_count;
    let remainder = values.len() % chunk_count;

    let mut chunks = Vec::with_capacity(chunk_count);
    let mut offset = 0;
    for index in 0..chunk_count {
        let len = if index < remainder { base + 1 } else { base };
        chunks.push(values[offset..offset + len].to_vec());
        offset += len;
    }
    chunks
}

/// Run `operation` up to `max_attempts` times, sleeping `base_delay x n^2`
/// after the n-th failure (500 ms, 2 s, 4.5 s with the defaults).
pub async fn retry_with_backoff<T, F, Fut>(
    max_attempts: u32,
    base_delay: Duration,
    operation_name: &str,
    mut operation: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut last_error: Option<AppError> = None;

    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt < max_attempts {
                    let delay = base_delay * (attempt * attempt);
                    log_warn!(
                        "{} attempt {}/{} failed: {}. Retrying in {:?}",
                        operation_name,
                        attempt,
                        max_attempts,
                        e,
                        delay
                    );
                    sleep(delay).await;
                }
                last_error = Some(e);
            }
        }
    }

    let cause = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "unknown error".to_string());
    Err(AppError::ExternalServiceError(format!(
        "{} failed after {} attempts: {}",
        operation_name, max_attempts, cause
    )))
}
