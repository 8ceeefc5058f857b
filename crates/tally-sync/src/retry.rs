//! # Retry Policy
//!
//! Bounded exponential backoff with randomized jitter for all
//! network-bound calls: queue draining, remote pulls, and the app layer's
//! AI-enhancement requests all go through this one component instead of
//! reimplementing backoff math at each call site.
//!
//! ## Attempt Timeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              RetryPolicy (defaults: 3 attempts, 1200ms, ×2.5)           │
//! │                                                                         │
//! │  attempt 1 ──fail──► wait 1200ms + random(0..200ms)                    │
//! │                      │                                                  │
//! │  attempt 2 ──fail──► wait 3000ms + random(0..200ms)                    │
//! │                      │                                                  │
//! │  attempt 3 ──fail──► RetryError::Exhausted { attempts: 3, last }       │
//! │                                                                         │
//! │  Any attempt, non-retryable error ──► RetryError::Fatal (no wait,      │
//! │  no retry consumed)                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Idempotence
//! The policy happily re-executes the operation; it is the caller's job to
//! make re-execution safe (stable mutation ids - the remote deduplicates).

use std::fmt::{Debug, Display};
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::RemoteError;

// =============================================================================
// Retry Error
// =============================================================================

/// Terminal outcome of a retried operation, annotated so callers can
/// distinguish "gave up after retries" from "failed once, fatally".
#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: Display + Debug,
{
    /// The error was classified non-retryable and returned immediately,
    /// without consuming a retry.
    #[error("Fatal (not retried): {0}")]
    Fatal(E),

    /// All attempts were consumed; `last` is the final failure.
    #[error("Exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E>
where
    E: Display + Debug,
{
    /// True if the operation gave up after consuming all attempts.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// The underlying error, whichever way the retry ended.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Fatal(e) => e,
            RetryError::Exhausted { last, .. } => last,
        }
    }

    /// Borrows the underlying error.
    pub fn inner(&self) -> &E {
        match self {
            RetryError::Fatal(e) => e,
            RetryError::Exhausted { last, .. } => last,
        }
    }
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Bounded exponential backoff with additive jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt budget, including the first try. Minimum 1.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Multiplier applied to the delay after each retry.
    pub backoff_factor: f64,

    /// Upper bound of the random addition to every wait.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1200),
            backoff_factor: 2.5,
            jitter: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with explicit bounds and the default jitter.
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff_factor,
            ..Default::default()
        }
    }

    /// Sets the jitter bound.
    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// A policy that never waits and never retries. For tests and for
    /// callers that want classification without backoff.
    pub fn no_retries() -> Self {
        RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            backoff_factor: 1.0,
            jitter: Duration::ZERO,
        }
    }

    /// Runs a remote operation, classifying errors via
    /// [`RemoteError::is_retryable`].
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T, RetryError<RemoteError>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        self.run_classified(op, RemoteError::is_retryable).await
    }

    /// Runs a fallible operation with a caller-supplied error classifier.
    ///
    /// The classifier returns `true` for errors worth retrying. Anything
    /// else short-circuits as [`RetryError::Fatal`] in a single attempt,
    /// with no wait.
    pub async fn run_classified<T, E, F, Fut, C>(
        &self,
        mut op: F,
        classify: C,
    ) -> Result<T, RetryError<E>>
    where
        E: Display + Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
    {
        let mut delay = self.base_delay;
        let mut attempt: u32 = 1;

        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }

                Err(e) if !classify(&e) => {
                    debug!(error = %e, "Non-retryable failure");
                    return Err(RetryError::Fatal(e));
                }

                Err(e) if attempt >= self.max_attempts => {
                    warn!(attempts = attempt, error = %e, "Retry budget exhausted");
                    return Err(RetryError::Exhausted { attempts: attempt, last: e });
                }

                Err(e) => {
                    let wait = delay + self.random_jitter();
                    warn!(
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "Retryable failure, backing off"
                    );

                    tokio::time::sleep(wait).await;

                    delay = delay.mul_f64(self.backoff_factor);
                    attempt += 1;
                }
            }
        }
    }

    fn random_jitter(&self) -> Duration {
        let bound = self.jitter.as_millis() as u64;
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..bound))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn transport() -> RemoteError {
        RemoteError::Transport("connection refused".into())
    }

    /// Paused-clock run of: n retryable failures, then success.
    /// Returns (result, wall-clock waits between attempts).
    async fn run_failing(
        policy: &RetryPolicy,
        failures: u32,
    ) -> (Result<u32, RetryError<RemoteError>>, Vec<Duration>) {
        let calls = AtomicU32::new(0);
        let stamps = std::sync::Mutex::new(Vec::new());

        let result = policy
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                stamps.lock().unwrap().push(Instant::now());
                async move {
                    if n < failures {
                        Err(transport())
                    } else {
                        Ok(n + 1)
                    }
                }
            })
            .await;

        let stamps = stamps.into_inner().unwrap();
        let waits = stamps.windows(2).map(|w| w[1] - w[0]).collect();
        (result, waits)
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_growth_within_jitter_bounds() {
        let policy = RetryPolicy {
            max_attempts: 4,
            ..Default::default()
        };

        let (result, waits) = run_failing(&policy, 3).await;
        assert_eq!(result.unwrap(), 4); // Succeeded on attempt 4
        assert_eq!(waits.len(), 3);

        // Delays are non-decreasing and roughly base * factor^n
        let expected = [1200u64, 3000, 7500];
        for (wait, base) in waits.iter().zip(expected) {
            let ms = wait.as_millis() as u64;
            assert!(ms >= base, "wait {ms}ms below base {base}ms");
            assert!(ms < base + 250, "wait {ms}ms exceeds jitter bound");
        }
        assert!(waits.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_is_annotated() {
        let policy = RetryPolicy::default();

        let (result, waits) = run_failing(&policy, 10).await;
        let err = result.unwrap_err();

        assert!(err.is_exhausted());
        assert!(matches!(
            err,
            RetryError::Exhausted { attempts: 3, last: RemoteError::Transport(_) }
        ));
        assert_eq!(waits.len(), 2); // 3 attempts = 2 waits
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_short_circuits_without_wait() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        let started = Instant::now();
        let result: Result<(), _> = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(RemoteError::Rejected {
                        reason: "validation failed".into(),
                    })
                }
            })
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, RetryError::Fatal(RemoteError::Rejected { .. })));
        assert!(!err.is_exhausted());

        // Single attempt, zero wait
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(Instant::now() - started, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_needs_no_retry() {
        let policy = RetryPolicy::default();
        let (result, waits) = run_failing(&policy, 0).await;
        assert_eq!(result.unwrap(), 1);
        assert!(waits.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_classifier() {
        // An AI-enhancement-style caller with string errors: only "busy"
        // is worth retrying.
        let policy = RetryPolicy {
            max_attempts: 2,
            jitter: Duration::ZERO,
            ..Default::default()
        };
        let calls = AtomicU32::new(0);

        let result: Result<(), RetryError<String>> = policy
            .run_classified(
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n == 0 {
                            Err("busy".to_string())
                        } else {
                            Err("quota exceeded".to_string())
                        }
                    }
                },
                |e| e == "busy",
            )
            .await;

        // First failure retried, second was fatal
        assert!(matches!(result.unwrap_err(), RetryError::Fatal(ref e) if e.as_str() == "quota exceeded"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_policy_defaults_and_builders() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(1200));
        assert!((policy.backoff_factor - 2.5).abs() < f64::EPSILON);
        assert_eq!(policy.jitter, Duration::from_millis(200));

        let tight = RetryPolicy::new(0, Duration::from_millis(10), 2.0).jitter(Duration::ZERO);
        assert_eq!(tight.max_attempts, 1); // Clamped
        assert_eq!(tight.jitter, Duration::ZERO);
    }
}
