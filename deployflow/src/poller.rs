//! Bounded polling for eventually-consistent cloud state.
//!
//! Rollout readiness and health checks share one primitive: probe, and if
//! the answer is "not yet", sleep and probe again until the attempt budget
//! runs out. A hard probe error aborts the loop immediately - a backend
//! that is answering with errors is not going to become ready by itself.

use crate::cancel::CancelToken;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Outcome of a single probe attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T, E> {
    /// The condition holds; polling stops and yields the value.
    Ready(T),
    /// The condition does not hold yet; polling continues.
    NotReadyYet,
    /// The probe itself failed; polling aborts.
    Failed(E),
}

impl<T, E> PollOutcome<T, E> {
    /// Returns true if the probe reported readiness.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Returns true if the probe reported "not yet".
    #[must_use]
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReadyYet)
    }

    /// Returns true if the probe itself failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Attempt budget and pacing for one polling loop.
///
/// The default bounds total wait to five minutes: 30 attempts at a
/// 10-second interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Maximum number of probe attempts.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub interval: Duration,
    /// Whether to add jitter to the delay.
    pub jitter: bool,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval: Duration::from_secs(10),
            jitter: false,
        }
    }
}

impl PollPolicy {
    /// Creates a policy with the given attempt budget and interval.
    #[must_use]
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            jitter: false,
        }
    }

    /// Enables jitter on the sleep interval.
    #[must_use]
    pub const fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// The delay to sleep between attempts.
    #[must_use]
    pub fn sleep_interval(&self) -> Duration {
        if self.jitter {
            // Up to 25% jitter
            let base = self.interval.as_secs_f64();
            Duration::from_secs_f64(base + base * 0.25 * rand::random::<f64>())
        } else {
            self.interval
        }
    }
}

/// Error from a polling loop.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PollError<E> {
    /// Every attempt reported "not yet".
    #[error("timed out after {attempts} attempts")]
    Timeout {
        /// How many attempts were made.
        attempts: u32,
    },

    /// A probe attempt returned a hard error.
    #[error("probe failed: {0}")]
    ProbeFailed(E),

    /// The run was cancelled while waiting.
    #[error("cancelled: {0}")]
    Cancelled(String),
}

/// Probes until ready, out of attempts, or aborted.
///
/// The probe receives the 1-based attempt number so callers can surface
/// "(n/30)" progress text. On `Ready` the loop returns immediately; on
/// `Failed` it aborts without further attempts; on `NotReadyYet` it sleeps
/// for the policy interval unless this was the final attempt. The sleep is
/// an async suspension point, so concurrent runs keep making progress.
pub async fn poll_until_ready<T, E, F, Fut>(
    policy: &PollPolicy,
    cancel: &CancelToken,
    mut probe: F,
) -> Result<T, PollError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = PollOutcome<T, E>>,
    E: std::fmt::Display,
{
    for attempt in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled(cancel.reason_or_default()));
        }

        match probe(attempt).await {
            PollOutcome::Ready(value) => return Ok(value),
            PollOutcome::Failed(error) => {
                tracing::debug!(attempt, error = %error, "probe failed hard; aborting poll");
                return Err(PollError::ProbeFailed(error));
            }
            PollOutcome::NotReadyYet => {
                if attempt < policy.max_attempts {
                    let delay = policy.sleep_interval();
                    tracing::debug!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        ?delay,
                        "not ready yet; sleeping"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(PollError::Timeout {
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn counting_probe(
        ready_on: u32,
        counter: Arc<AtomicU32>,
    ) -> impl FnMut(u32) -> std::future::Ready<PollOutcome<u32, String>> {
        move |attempt| {
            counter.fetch_add(1, Ordering::SeqCst);
            if attempt >= ready_on {
                std::future::ready(PollOutcome::Ready(attempt))
            } else {
                std::future::ready(PollOutcome::NotReadyYet)
            }
        }
    }

    #[tokio::test]
    async fn test_ready_on_first_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let policy = PollPolicy::new(5, Duration::from_secs(10));

        let result =
            poll_until_ready(&policy, &CancelToken::new(), counting_probe(1, counter.clone()))
                .await;

        assert_eq!(result, Ok(1));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_nth_attempt_sleeps_n_minus_one_times() {
        let counter = Arc::new(AtomicU32::new(0));
        let policy = PollPolicy::new(30, Duration::from_secs(10));
        let started = Instant::now();

        let result =
            poll_until_ready(&policy, &CancelToken::new(), counting_probe(4, counter.clone()))
                .await;

        assert_eq!(result, Ok(4));
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        // Three sleeps of the full interval, nothing more
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_after_exactly_max_attempts() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let policy = PollPolicy::new(3, Duration::from_secs(10));
        let started = Instant::now();

        let result: Result<(), PollError<String>> =
            poll_until_ready(&policy, &CancelToken::new(), move |_| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                std::future::ready(PollOutcome::NotReadyYet)
            })
            .await;

        assert_eq!(result, Err(PollError::Timeout { attempts: 3 }));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        // No sleep after the final attempt
        assert_eq!(started.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_failed_probe_aborts_immediately() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let policy = PollPolicy::new(30, Duration::from_secs(10));

        let result: Result<(), PollError<String>> =
            poll_until_ready(&policy, &CancelToken::new(), move |attempt| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                if attempt == 2 {
                    std::future::ready(PollOutcome::Failed("backend exploded".to_string()))
                } else {
                    std::future::ready(PollOutcome::NotReadyYet)
                }
            })
            .await;

        assert_eq!(
            result,
            Err(PollError::ProbeFailed("backend exploded".to_string()))
        );
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_probe_sees_one_based_attempt_numbers() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let policy = PollPolicy::new(3, Duration::from_millis(1));

        let _: Result<(), PollError<String>> =
            poll_until_ready(&policy, &CancelToken::new(), move |attempt| {
                seen_clone.lock().push(attempt);
                std::future::ready(PollOutcome::NotReadyYet)
            })
            .await;

        assert_eq!(*seen.lock(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_probe() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let policy = PollPolicy::default();
        let cancel = CancelToken::new();
        cancel.cancel("shutting down");

        let result: Result<(), PollError<String>> =
            poll_until_ready(&policy, &cancel, move |_| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                std::future::ready(PollOutcome::NotReadyYet)
            })
            .await;

        assert_eq!(result, Err(PollError::Cancelled("shutting down".to_string())));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_default_policy_bounds_wait_to_five_minutes() {
        let policy = PollPolicy::default();
        assert_eq!(policy.max_attempts, 30);
        assert_eq!(policy.interval, Duration::from_secs(10));
        assert!(!policy.jitter);
    }

    #[test]
    fn test_jittered_interval_stays_in_range() {
        let policy = PollPolicy::new(5, Duration::from_secs(10)).with_jitter();

        for _ in 0..100 {
            let delay = policy.sleep_interval();
            assert!(delay >= Duration::from_secs(10));
            assert!(delay <= Duration::from_secs_f64(12.5));
        }
    }
}
