//! Transport-level retry policy.
//!
//! Retries apply only to requests that never produced an HTTP response:
//! timeouts and connections dropped mid-flight. Anything the server
//! actually answered, including 5xx, is a business outcome the protocol
//! layer above decides about. Attempt counts are tracked per request URL
//! so parallel requests to different endpoints back off independently.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bridge_traits::BridgeError;
use tokio::sync::Mutex;
use tracing::debug;

/// Maximum number of retry attempts after the initial attempt
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay between attempts in milliseconds
const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Exponent cap so backoff arithmetic cannot overflow
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Whether a transport error is worth repeating the request for.
///
/// `ConnectionFailed` (the dial itself was refused) is excluded: within
/// one retry window the listener's answer will not change.
/// `OperationFailed` covers malformed requests and similar local bugs;
/// repeating those burns attempts without hope.
pub fn is_transient_transport_error(error: &BridgeError) -> bool {
    matches!(error, BridgeError::TimedOut | BridgeError::ConnectionLost(_))
}

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every attempt.
    Fixed(Duration),
    /// Delay doubles per attempt, capped.
    Exponential { initial: Duration, cap: Duration },
}

impl Backoff {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential { initial, cap } => {
                let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
                let millis = initial.as_millis() as u64 * (1u64 << exponent);
                Duration::from_millis(millis).min(*cap)
            }
        }
    }
}

/// How many times to retry and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt; 3 means at most 4 attempts.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Backoff::Fixed(Duration::from_millis(DEFAULT_RETRY_DELAY_MS)),
        }
    }
}

impl RetryPolicy {
    /// Policy from the host-supplied network tuning knobs.
    pub fn from_tuning(tuning: &core_runtime::config::NetworkTuning) -> Self {
        Self {
            max_retries: tuning.max_retries,
            backoff: Backoff::Fixed(Duration::from_millis(tuning.retry_delay_ms)),
        }
    }
}

/// Verdict for one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then repeat the request.
    RetryAfter(Duration),
    /// Surface the error to the caller.
    GiveUp,
}

/// Per-request bookkeeping, alive between the first transport failure and
/// termination.
#[derive(Debug, Clone, Copy)]
struct RetryState {
    attempts: u32,
    first_attempt: Instant,
}

/// Tracks retry budgets for in-flight requests.
///
/// Keys are request URLs. An entry exists only between the first transport
/// failure of a request and its termination; [`finish`](Self::finish) must
/// be called when a request completes either way, so a later request to
/// the same URL starts with a full budget.
pub struct Retrier {
    policy: RetryPolicy,
    states: Mutex<HashMap<String, RetryState>>,
}

impl Retrier {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failed attempt for `key` and decide whether to retry.
    ///
    /// Exhausting the budget clears the entry, so the key is immediately
    /// reusable by a fresh request.
    pub async fn should_retry(&self, key: &str, error: &BridgeError) -> RetryDecision {
        if !is_transient_transport_error(error) {
            return RetryDecision::GiveUp;
        }

        let mut states = self.states.lock().await;
        let state = states.entry(key.to_string()).or_insert_with(|| RetryState {
            attempts: 0,
            first_attempt: Instant::now(),
        });
        state.attempts += 1;
        let attempts = state.attempts;

        if attempts > self.policy.max_retries {
            let elapsed_ms = state.first_attempt.elapsed().as_millis() as u64;
            states.remove(key);
            debug!(key, attempts, elapsed_ms, "Retry budget exhausted");
            return RetryDecision::GiveUp;
        }

        RetryDecision::RetryAfter(self.policy.backoff.delay_for(attempts))
    }

    /// Drop the retry state for a terminated request.
    pub async fn finish(&self, key: &str) {
        self.states.lock().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn millis(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn test_transport_error_classification() {
        assert!(is_transient_transport_error(&BridgeError::TimedOut));
        assert!(is_transient_transport_error(&BridgeError::ConnectionLost(
            "reset".to_string()
        )));

        assert!(!is_transient_transport_error(&BridgeError::ConnectionFailed(
            "refused".to_string()
        )));
        assert!(!is_transient_transport_error(&BridgeError::NotAvailable(
            "no transport".to_string()
        )));
        assert!(!is_transient_transport_error(&BridgeError::OperationFailed(
            "bad request body".to_string()
        )));
    }

    #[test]
    fn test_fixed_backoff_is_constant() {
        let backoff = Backoff::Fixed(millis(500));
        assert_eq!(backoff.delay_for(1), millis(500));
        assert_eq!(backoff.delay_for(4), millis(500));
    }

    #[test]
    fn test_exponential_backoff_doubles_and_caps() {
        let backoff = Backoff::Exponential {
            initial: millis(100),
            cap: millis(1000),
        };
        assert_eq!(backoff.delay_for(1), millis(100));
        assert_eq!(backoff.delay_for(2), millis(200));
        assert_eq!(backoff.delay_for(3), millis(400));
        assert_eq!(backoff.delay_for(10), millis(1000));
        // Huge attempt numbers must not overflow.
        assert_eq!(backoff.delay_for(u32::MAX), millis(1000));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let retrier = Retrier::new(RetryPolicy {
            max_retries: 3,
            backoff: Backoff::Fixed(millis(500)),
        });
        let error = BridgeError::TimedOut;

        for _ in 0..3 {
            assert_eq!(
                retrier.should_retry("https://mail.example.com/sync", &error).await,
                RetryDecision::RetryAfter(millis(500))
            );
        }
        assert_eq!(
            retrier.should_retry("https://mail.example.com/sync", &error).await,
            RetryDecision::GiveUp
        );
    }

    #[tokio::test]
    async fn test_non_transient_error_gives_up_immediately() {
        let retrier = Retrier::new(RetryPolicy::default());
        let error = BridgeError::OperationFailed("json encoding".to_string());

        assert_eq!(
            retrier.should_retry("https://mail.example.com/send", &error).await,
            RetryDecision::GiveUp
        );
    }

    #[tokio::test]
    async fn test_finish_resets_backoff_state() {
        let retrier = Retrier::new(RetryPolicy {
            max_retries: 5,
            backoff: Backoff::Exponential {
                initial: millis(100),
                cap: millis(10_000),
            },
        });
        let error = BridgeError::ConnectionLost("reset".to_string());
        let key = "https://mail.example.com/sync";

        retrier.should_retry(key, &error).await;
        assert_eq!(
            retrier.should_retry(key, &error).await,
            RetryDecision::RetryAfter(millis(200))
        );

        retrier.finish(key).await;
        assert_eq!(
            retrier.should_retry(key, &error).await,
            RetryDecision::RetryAfter(millis(100))
        );
    }

    #[tokio::test]
    async fn test_exhaustion_clears_state_for_next_request() {
        let retrier = Retrier::new(RetryPolicy {
            max_retries: 1,
            backoff: Backoff::Fixed(millis(10)),
        });
        let error = BridgeError::TimedOut;
        let key = "https://mail.example.com/sync";

        assert_eq!(
            retrier.should_retry(key, &error).await,
            RetryDecision::RetryAfter(millis(10))
        );
        assert_eq!(retrier.should_retry(key, &error).await, RetryDecision::GiveUp);

        // A fresh request to the same URL gets a full budget again.
        assert_eq!(
            retrier.should_retry(key, &error).await,
            RetryDecision::RetryAfter(millis(10))
        );
    }

    #[tokio::test]
    async fn test_urls_tracked_independently() {
        let retrier = Retrier::new(RetryPolicy {
            max_retries: 1,
            backoff: Backoff::Fixed(millis(10)),
        });
        let error = BridgeError::TimedOut;

        retrier.should_retry("https://mail.example.com/a", &error).await;
        assert_eq!(
            retrier.should_retry("https://mail.example.com/a", &error).await,
            RetryDecision::GiveUp
        );

        assert_eq!(
            retrier.should_retry("https://mail.example.com/b", &error).await,
            RetryDecision::RetryAfter(millis(10))
        );
    }
}
