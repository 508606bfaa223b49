//! Fire-and-forget side effects
//!
//! Checkpoints, history writes and notifications never block gameplay. They
//! run on their own task and are retried with exponential backoff; an
//! effect that exhausts its attempts is logged and dropped.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub factor: u32,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 200,
            factor: 2,
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1 = first retry)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let multiplier = (self.factor as u64).saturating_pow(exp);
        Duration::from_millis(self.base_delay_ms.saturating_mul(multiplier))
    }
}

/// Run `op` until it succeeds or the policy gives up
pub async fn retry_with_backoff<T, E, F, Fut>(policy: RetryPolicy, what: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= policy.max_attempts.max(1) => {
                error!(effect = what, attempts = attempt, error = %e, "Side effect failed, giving up");
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                warn!(effect = what, attempt, delay_ms = delay.as_millis() as u64, error = %e, "Side effect failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_delay_schedule() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(1), Duration::from_millis(200));
        assert_eq!(p.delay_for(2), Duration::from_millis(400));
        assert_eq!(p.delay_for(4), Duration::from_millis(1600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<u32, String> = retry_with_backoff(RetryPolicy::default(), "test", move || {
            let c = c.clone();
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("attempt {}", n))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), String> = retry_with_backoff(RetryPolicy::default(), "test", move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }
}
