//! Exponential backoff with jitter for upstream calls

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::KnowledgeError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based).
    ///
    /// A `Retry-After` hint wins over the computed backoff; both are capped
    /// at `max_delay_ms`. Without a hint the delay is "equal jitter": half
    /// the exponential step plus a random share of the other half.
    pub fn backoff_delay<R: Rng>(
        &self,
        attempt: u32,
        retry_after_secs: Option<u64>,
        rng: &mut R,
    ) -> Duration {
        let cap = self.max_delay_ms;
        if let Some(secs) = retry_after_secs {
            return Duration::from_millis(secs.saturating_mul(1_000).min(cap));
        }
        let exp = self
            .base_delay_ms
            .saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX))
            .min(cap);
        let half = exp / 2;
        let jitter = if exp > half {
            rng.gen_range(0..=exp - half)
        } else {
            0
        };
        Duration::from_millis(half + jitter)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// retry ceiling is reached. The last error is returned.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, KnowledgeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, KnowledgeError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = {
                        let mut rng = rand::thread_rng();
                        self.backoff_delay(attempt, e.retry_after_secs(), &mut rng)
                    };
                    debug!(
                        what,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying upstream call"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        warn!(what, attempts = attempt + 1, error = %e, "Giving up after retries");
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
        }
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let p = policy();
        let mut rng = StdRng::seed_from_u64(7);
        for attempt in 0..12 {
            let d = p.backoff_delay(attempt, None, &mut rng).as_millis() as u64;
            let exp = (100u64 << attempt.min(20)).min(1_000);
            assert!(d >= exp / 2 && d <= exp, "attempt {attempt}: {d}ms vs {exp}ms");
        }
    }

    #[test]
    fn retry_after_hint_wins_but_is_capped() {
        let p = policy();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(p.backoff_delay(0, Some(0), &mut rng), Duration::ZERO);
        assert_eq!(
            p.backoff_delay(0, Some(120), &mut rng),
            Duration::from_millis(1_000)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result = policy()
            .run("test", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(KnowledgeError::RateLimited {
                        retry_after_secs: None,
                    })
                } else {
                    Ok(n)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_retry_ceiling() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let result: Result<(), _> = policy()
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(KnowledgeError::Status {
                    status: 503,
                    body: String::new(),
                })
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // three sleeps of at least 50, 100 and 200ms
        assert!(started.elapsed() >= Duration::from_millis(350));
    }

    #[tokio::test(start_paused = true)]
    async fn honours_retry_after() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let _ = policy()
            .run("test", || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(KnowledgeError::RateLimited {
                        retry_after_secs: Some(1),
                    })
                } else {
                    Ok(())
                }
            })
            .await;
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy()
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(KnowledgeError::Malformed("bad".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
