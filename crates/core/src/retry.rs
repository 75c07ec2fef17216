//! Retry classification and backoff helpers shared by the REST and realtime
//! layers.

use std::time::Duration;

use rand::Rng;

/// Retry policy class for request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

/// Classify an HTTP status into retry behavior.
pub fn classify_http_status(status: u16) -> RetryClass {
    match status {
        401 | 403 => RetryClass::ReauthRequired,
        408 | 409 | 423 | 425 | 429 => RetryClass::Retryable,
        500..=599 => RetryClass::Retryable,
        _ => RetryClass::Permanent,
    }
}

/// Linear backoff used by the reference-data fetch: `base * attempt`.
/// Attempts are 1-based.
pub fn linear_backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt.max(1))
}

/// Exponential backoff with jitter for reconnect attempts. Attempts are
/// 1-based; the exponent is capped so the delay saturates at `max_ms`.
pub fn backoff_with_jitter(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exp = attempt.saturating_sub(1).min(8);
    let backoff = base_ms.saturating_mul(1_u64 << exp).min(max_ms);
    let jitter = rand::thread_rng().gen_range(0..=(backoff / 5).max(1));
    Duration::from_millis(backoff.saturating_add(jitter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_http_status_for_retry_policy() {
        assert_eq!(classify_http_status(500), RetryClass::Retryable);
        assert_eq!(classify_http_status(429), RetryClass::Retryable);
        assert_eq!(classify_http_status(401), RetryClass::ReauthRequired);
        assert_eq!(classify_http_status(400), RetryClass::Permanent);
        assert_eq!(classify_http_status(404), RetryClass::Permanent);
    }

    #[test]
    fn linear_backoff_scales_with_attempt() {
        let base = Duration::from_millis(200);
        assert_eq!(linear_backoff(base, 1), Duration::from_millis(200));
        assert_eq!(linear_backoff(base, 2), Duration::from_millis(400));
        assert_eq!(linear_backoff(base, 3), Duration::from_millis(600));
        // attempt 0 is treated as the first attempt
        assert_eq!(linear_backoff(base, 0), Duration::from_millis(200));
    }

    #[test]
    fn exponential_backoff_is_capped() {
        for attempt in 1..=20 {
            let delay = backoff_with_jitter(attempt, 250, 8_000);
            // max plus max jitter (one fifth)
            assert!(delay <= Duration::from_millis(8_000 + 1_600));
        }
        let first = backoff_with_jitter(1, 250, 8_000);
        assert!(first >= Duration::from_millis(250));
    }
}
