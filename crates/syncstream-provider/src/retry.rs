//! Rate-limit retry policy

use std::time::Duration;
use syncstream_config::RetrySettings;

/// How the client waits out 429 responses.
///
/// A server-provided `Retry-After` is honored in units of
/// `retry_after_unit`. Without one, the wait grows from
/// `default_retry_after` by `backoff_multiplier` per attempt. Either way
/// the wait never exceeds `max_backoff`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_rate_limit_retries: u32,
    pub default_retry_after: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    /// Length of one `Retry-After` unit (one second against the real API)
    pub retry_after_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_rate_limit_retries: 5,
            default_retry_after: Duration::from_secs(5),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            retry_after_unit: Duration::from_secs(1),
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_rate_limit_retries: settings.max_rate_limit_retries,
            default_retry_after: settings.default_retry_after,
            max_backoff: settings.max_backoff,
            backoff_multiplier: settings.backoff_multiplier,
            retry_after_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based)
    pub fn delay_for(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        if let Some(units) = retry_after {
            let units = u32::try_from(units).unwrap_or(u32::MAX);
            return self.retry_after_unit.saturating_mul(units).min(self.max_backoff);
        }

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.default_retry_after.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_backoff.as_secs_f64() {
            self.max_backoff
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Whether another retry is allowed after `attempts` retries so far
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_rate_limit_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_header_is_honored() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0, Some(3)), Duration::from_secs(3));
        assert_eq!(policy.delay_for(4, Some(3)), Duration::from_secs(3));
    }

    #[test]
    fn retry_after_header_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0, Some(86_400)), Duration::from_secs(60));
        assert_eq!(policy.delay_for(0, Some(u64::MAX)), Duration::from_secs(60));

        let tight = RetryPolicy {
            max_backoff: Duration::from_secs(2),
            ..Default::default()
        };
        assert_eq!(tight.delay_for(0, Some(3)), Duration::from_secs(2));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0, None), Duration::from_secs(5));
        assert_eq!(policy.delay_for(1, None), Duration::from_secs(10));
        assert_eq!(policy.delay_for(2, None), Duration::from_secs(20));
        assert_eq!(policy.delay_for(4, None), Duration::from_secs(60));
        assert_eq!(policy.delay_for(u32::MAX, None), Duration::from_secs(60));
    }

    #[test]
    fn retry_budget() {
        let policy = RetryPolicy {
            max_rate_limit_retries: 2,
            ..Default::default()
        };
        assert!(policy.allows_retry(0));
        assert!(policy.allows_retry(1));
        assert!(!policy.allows_retry(2));
    }
}
