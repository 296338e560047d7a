//! Request retry policy.
//!
//! The policy is pure: it answers "should this attempt be retried" and "how
//! long to wait before it". Effects own the actual waiting.

use std::time::Duration;

use crate::error::{ErrorReason, PubNubError};
use crate::transport::TransportResponse;

/// Retry policy for failed requests.
///
/// Attempts are counted from zero: `should_retry(0, ..)` asks whether the
/// first failure may be retried.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestRetryPolicy {
    /// Never retry.
    #[default]
    None,

    /// Retry after a constant delay.
    Linear {
        /// Delay between attempts.
        delay: Duration,
        /// Maximum number of retries.
        max_retry: u32,
    },

    /// Retry with a delay that doubles each attempt.
    Exponential {
        /// Delay before the first retry.
        min_delay: Duration,
        /// Upper bound for the delay.
        max_delay: Duration,
        /// Maximum number of retries.
        max_retry: u32,
    },
}

impl RequestRetryPolicy {
    /// Linear policy with the service's recommended defaults.
    pub fn default_linear() -> Self {
        RequestRetryPolicy::Linear {
            delay: Duration::from_secs(2),
            max_retry: 10,
        }
    }

    /// Exponential policy with the service's recommended defaults.
    pub fn default_exponential() -> Self {
        RequestRetryPolicy::Exponential {
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(150),
            max_retry: 6,
        }
    }

    /// Maximum number of retries.
    pub fn retry_limit(&self) -> u32 {
        match self {
            RequestRetryPolicy::None => 0,
            RequestRetryPolicy::Linear { max_retry, .. }
            | RequestRetryPolicy::Exponential { max_retry, .. } => *max_retry,
        }
    }

    /// Whether a request that failed on `attempt` should be retried.
    ///
    /// When a response is available its status decides retryability,
    /// otherwise the error classification does.
    pub fn should_retry(
        &self,
        attempt: u32,
        error: &PubNubError,
        response: Option<&TransportResponse>,
    ) -> bool {
        if attempt >= self.retry_limit() {
            return false;
        }

        match response {
            Some(response) => ErrorReason::from_status(response.status).is_retryable(),
            None => error.is_retryable(),
        }
    }

    /// Delay to wait before retrying after a failure on `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            RequestRetryPolicy::None => Duration::ZERO,
            RequestRetryPolicy::Linear { delay, .. } => *delay,
            RequestRetryPolicy::Exponential {
                min_delay,
                max_delay,
                ..
            } => {
                let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
                min_delay.saturating_mul(factor).min(*max_delay)
            }
        }
    }
}

/// Delay before a delayed heartbeat is sent.
///
/// Attempt `0` fires immediately. Later attempts follow the policy shifted by
/// one, capped at half the presence timeout.
pub(crate) fn heartbeat_retry_delay(
    policy: &RequestRetryPolicy,
    presence_timeout: u64,
    attempt: u32,
) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    policy
        .delay(attempt - 1)
        .min(Duration::from_secs(presence_timeout / 2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;

    fn timeout() -> PubNubError {
        TransportError::timeout("slow").into()
    }

    #[test]
    fn test_none_never_retries() {
        let policy = RequestRetryPolicy::None;
        assert_eq!(policy.retry_limit(), 0);
        assert!(!policy.should_retry(0, &timeout(), None));
    }

    #[test]
    fn test_linear_respects_limit() {
        let policy = RequestRetryPolicy::Linear {
            delay: Duration::from_secs(3),
            max_retry: 2,
        };
        assert!(policy.should_retry(0, &timeout(), None));
        assert!(policy.should_retry(1, &timeout(), None));
        assert!(!policy.should_retry(2, &timeout(), None));
        assert_eq!(policy.delay(0), Duration::from_secs(3));
        assert_eq!(policy.delay(7), Duration::from_secs(3));
    }

    #[test]
    fn test_exponential_doubles_and_caps() {
        let policy = RequestRetryPolicy::Exponential {
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(20),
            max_retry: 10,
        };
        assert_eq!(policy.delay(0), Duration::from_secs(2));
        assert_eq!(policy.delay(1), Duration::from_secs(4));
        assert_eq!(policy.delay(3), Duration::from_secs(16));
        assert_eq!(policy.delay(4), Duration::from_secs(20));
        assert_eq!(policy.delay(40), Duration::from_secs(20));
    }

    #[test]
    fn test_non_retryable_errors_are_never_retried() {
        let policy = RequestRetryPolicy::default_linear();
        let forbidden = PubNubError::from_response(403, b"");
        assert!(!policy.should_retry(0, &forbidden, None));

        let cancelled: PubNubError = TransportError::cancelled("dropped").into();
        assert!(!policy.should_retry(0, &cancelled, None));
    }

    #[test]
    fn test_response_status_decides_when_present() {
        let policy = RequestRetryPolicy::default_linear();
        let err = PubNubError::from_response(503, b"");
        assert!(policy.should_retry(0, &err, Some(&TransportResponse::new(503, ""))));
        assert!(!policy.should_retry(0, &err, Some(&TransportResponse::new(400, ""))));
    }

    #[test]
    fn test_heartbeat_retry_delay() {
        let policy = RequestRetryPolicy::Exponential {
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(150),
            max_retry: 6,
        };
        assert_eq!(heartbeat_retry_delay(&policy, 300, 0), Duration::ZERO);
        assert_eq!(heartbeat_retry_delay(&policy, 300, 1), Duration::from_secs(2));
        assert_eq!(heartbeat_retry_delay(&policy, 300, 2), Duration::from_secs(4));
        // capped at half the presence timeout
        assert_eq!(heartbeat_retry_delay(&policy, 20, 5), Duration::from_secs(10));
    }
}
