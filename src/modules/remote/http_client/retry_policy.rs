//! Retry policy for transient remote failures.
//!
//! GET requests are retried at the request level inside the client; bulk
//! imports are retried at the chunk level by the transfer engine. Both honor
//! server-provided `Retry-After` hints on 429 responses.

use std::time::Duration;

/// Configuration for HTTP retry behavior
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay between retries (adjusted by headers when present)
    pub base_delay: Duration,
    /// Maximum delay to wait (prevents excessive waits)
    pub max_delay: Duration,
    /// Whether to use exponential backoff
    pub exponential_backoff: bool,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Default policy for DHIS2-style instances: slow servers, generous
    /// timeouts, three extra attempts on 429/5xx.
    pub fn platform_default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            exponential_backoff: true,
            backoff_multiplier: 2.0,
        }
    }

    /// Calculate delay for the next retry attempt
    pub fn calculate_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        // If the server provided Retry-After, respect it
        if let Some(server_delay) = retry_after {
            return server_delay.min(self.max_delay);
        }

        let delay = if self.exponential_backoff {
            let multiplier = self.backoff_multiplier.powi(attempt as i32);
            Duration::from_millis((self.base_delay.as_millis() as f64 * multiplier) as u64)
        } else {
            self.base_delay
        };

        delay.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::platform_default()
    }
}

/// Information extracted from HTTP 429 responses
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// How long to wait before the next request (Retry-After header)
    pub retry_after: Option<Duration>,
    /// When the rate limit resets (X-RateLimit-Reset header)
    pub reset_time: Option<Duration>,
}

impl RateLimitInfo {
    /// Parse rate limit information from HTTP response headers
    pub fn from_headers(headers: &reqwest::header::HeaderMap) -> Self {
        let retry_after = headers
            .get("retry-after")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs);

        let reset_time = headers
            .get("x-ratelimit-reset")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(|timestamp| {
                let now = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();
                if timestamp > now {
                    Duration::from_secs(timestamp - now)
                } else {
                    Duration::from_secs(0)
                }
            });

        Self {
            retry_after,
            reset_time,
        }
    }

    /// Best delay recommendation from the available headers
    pub fn recommended_delay(&self) -> Option<Duration> {
        if let Some(delay) = self.retry_after {
            return Some(delay);
        }
        self.reset_time
    }
}

/// Whether a failed request is worth retrying
pub fn is_retryable_error(error: &reqwest::Error) -> bool {
    if let Some(status) = error.status() {
        is_retryable_status(status.as_u16())
    } else {
        // Network errors are potentially transient
        error.is_timeout() || error.is_connect()
    }
}

/// Status codes treated as transient
pub fn is_retryable_status(status: u16) -> bool {
    match status {
        // Rate limiting
        429 => true,
        // Server errors
        500..=599 => true,
        // Request timeout / too early
        408 | 425 => true,
        _ => false,
    }
}
