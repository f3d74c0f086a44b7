//! Rate-limit retry over a fixed delay schedule.
//!
//! Attempts run 1..=N. A rate-limited attempt below N sleeps for the
//! scheduled delay and tries again; at N the loop gives up with
//! [`ValidatorError::RetriesExhausted`]. Any other failure ends the loop
//! immediately.

use crate::error::{ValidatorError, ValidatorResult};
use crate::providers::Sleeper;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay after each failed attempt, in seconds. Non-decreasing.
    pub delays_secs: Vec<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delays_secs: vec![10, 20, 40],
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based). The last
    /// scheduled delay is reused when the schedule runs out.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let index = attempt.saturating_sub(1) as usize;
        let secs = self
            .delays_secs
            .get(index)
            .or_else(|| self.delays_secs.last())
            .copied()
            .unwrap_or(0);
        Duration::from_secs(secs)
    }

    pub fn is_non_decreasing(&self) -> bool {
        self.delays_secs.windows(2).all(|pair| pair[0] <= pair[1])
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Runs `operation` until it succeeds, fails fatally, or the attempt
/// budget is spent on rate limits. `operation` receives the 1-based
/// attempt number.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut operation: F,
) -> ValidatorResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ValidatorResult<T>>,
{
    let max_attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(ValidatorError::RateLimited { provider, message }) => {
                if attempt >= max_attempts {
                    warn!("Attempt {}/{} rate limited by '{}', giving up", attempt, max_attempts, provider);
                    return Err(ValidatorError::RetriesExhausted {
                        attempts: attempt,
                        provider,
                    });
                }

                let delay = policy.delay_after(attempt);
                warn!(
                    "Attempt {}/{} rate limited by '{}' ({}), retrying in {}s",
                    attempt,
                    max_attempts,
                    provider,
                    message,
                    delay.as_secs()
                );
                sleeper.sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Sleeper that records requested delays instead of waiting.
    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    fn rate_limited() -> ValidatorError {
        ValidatorError::RateLimited {
            provider: "groq".to_string(),
            message: "429".to_string(),
        }
    }

    fn fatal() -> ValidatorError {
        ValidatorError::Provider {
            provider: "groq".to_string(),
            message: "HTTP 401".to_string(),
        }
    }

    /// Replays scripted results and counts invocations.
    async fn run_script(
        policy: &RetryPolicy,
        sleeper: &RecordingSleeper,
        script: Vec<ValidatorResult<&'static str>>,
    ) -> (ValidatorResult<&'static str>, u32) {
        let script = Mutex::new(VecDeque::from(script));
        let calls = Mutex::new(0u32);
        let (script_ref, calls_ref) = (&script, &calls);

        let result = run_with_retry(policy, sleeper, move |_attempt| async move {
            *calls_ref.lock().unwrap() += 1;
            let next = script_ref.lock().unwrap().pop_front();
            next.unwrap_or(Err(rate_limited()))
        })
        .await;

        let count = *calls.lock().unwrap();
        (result, count)
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(10));
        assert_eq!(policy.delay_after(2), Duration::from_secs(20));
        assert_eq!(policy.delay_after(3), Duration::from_secs(40));
        assert_eq!(policy.delay_after(7), Duration::from_secs(40));

        let empty = RetryPolicy {
            max_attempts: 2,
            delays_secs: vec![],
        };
        assert_eq!(empty.delay_after(1), Duration::ZERO);
    }

    #[test]
    fn test_non_decreasing_schedule() {
        assert!(RetryPolicy::default().is_non_decreasing());
        let flat = RetryPolicy {
            max_attempts: 3,
            delays_secs: vec![5, 5, 5],
        };
        assert!(flat.is_non_decreasing());
        let shrinking = RetryPolicy {
            max_attempts: 3,
            delays_secs: vec![40, 10],
        };
        assert!(!shrinking.is_non_decreasing());
    }

    #[tokio::test]
    async fn test_success_first_attempt_no_sleep() {
        let sleeper = RecordingSleeper::default();
        let (result, calls) = run_script(&RetryPolicy::default(), &sleeper, vec![Ok("report")]).await;

        assert_eq!(result, Ok("report"));
        assert_eq!(calls, 1);
        assert!(sleeper.slept.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_k_rate_limits_below_n_make_k_plus_one_calls() {
        let policy = RetryPolicy::default();
        for k in 0..policy.max_attempts {
            let sleeper = RecordingSleeper::default();
            let mut script: Vec<ValidatorResult<&'static str>> = (0..k).map(|_| Err(rate_limited())).collect();
            script.push(Ok("report"));

            let (result, calls) = run_script(&policy, &sleeper, script).await;

            assert_eq!(result, Ok("report"));
            assert_eq!(calls, k + 1);
            assert_eq!(sleeper.slept.lock().unwrap().len(), k as usize);
        }
    }

    #[tokio::test]
    async fn test_sleeps_follow_schedule() {
        let sleeper = RecordingSleeper::default();
        let (_, _) = run_script(
            &RetryPolicy::default(),
            &sleeper,
            vec![Err(rate_limited()), Err(rate_limited()), Ok("report")],
        )
        .await;

        assert_eq!(
            *sleeper.slept.lock().unwrap(),
            vec![Duration::from_secs(10), Duration::from_secs(20)]
        );
    }

    #[tokio::test]
    async fn test_exhaustion_makes_exactly_n_calls() {
        let sleeper = RecordingSleeper::default();
        let script = (0..10).map(|_| Err(rate_limited())).collect();

        let (result, calls) = run_script(&RetryPolicy::default(), &sleeper, script).await;

        assert_eq!(
            result,
            Err(ValidatorError::RetriesExhausted {
                attempts: 3,
                provider: "groq".to_string(),
            })
        );
        assert_eq!(calls, 3);
        assert_eq!(sleeper.slept.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let sleeper = RecordingSleeper::default();
        let (result, calls) = run_script(&RetryPolicy::default(), &sleeper, vec![Err(fatal()), Ok("report")]).await;

        assert_eq!(result, Err(fatal()));
        assert_eq!(calls, 1);
        assert!(sleeper.slept.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fatal_after_rate_limit_stops() {
        let sleeper = RecordingSleeper::default();
        let (result, calls) = run_script(
            &RetryPolicy::default(),
            &sleeper,
            vec![Err(rate_limited()), Err(fatal()), Ok("report")],
        )
        .await;

        assert_eq!(result, Err(fatal()));
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            delays_secs: vec![1],
        };
        let sleeper = RecordingSleeper::default();
        let (result, calls) = run_script(&policy, &sleeper, vec![Err(rate_limited())]).await;

        assert!(matches!(result, Err(ValidatorError::RetriesExhausted { attempts: 1, .. })));
        assert_eq!(calls, 1);
    }
}
