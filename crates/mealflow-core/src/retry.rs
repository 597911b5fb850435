//! Bounded retry for transient collaborator failures.
//!
//! Only errors reporting `is_transient()` are retried; everything else
//! surfaces on the first attempt. Backoff grows linearly with the attempt.
//! An optional budget caps the time spent across all attempts, so a node's
//! retries end with a collaborator error before the engine's step timeout
//! fires.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use mealflow_types::config::EngineConfig;
use mealflow_types::error::CollaboratorError;

/// Retry policy for a single collaborator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub backoff: Duration,
    /// Wall-clock cap over all attempts and backoff sleeps.
    pub budget: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(retries: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: retries + 1,
            backoff,
            budget: None,
        }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.fetch_retries, Duration::from_millis(config.retry_backoff_ms))
            .with_budget(call_budget(config))
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Whether a failed `attempt` (1-based) should be followed by another.
    pub fn should_retry(&self, attempt: u32, error: &CollaboratorError) -> bool {
        attempt < self.max_attempts && error.is_transient()
    }

    /// Run `op` until it succeeds, fails permanently, attempts run out, or
    /// the budget is spent. An exhausted budget yields
    /// [`CollaboratorError::Timeout`].
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, CollaboratorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CollaboratorError>>,
    {
        let deadline = self.budget.map(|budget| Instant::now() + budget);
        let mut attempt = 1;
        loop {
            let result = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, op()).await {
                    Ok(result) => result,
                    Err(_elapsed) => return Err(self.budget_spent(label, attempt)),
                },
                None => op().await,
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if self.should_retry(attempt, &e) => {
                    tracing::warn!(
                        call = label,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "transient collaborator failure, retrying"
                    );
                    let wake = Instant::now() + self.backoff * attempt;
                    if deadline.is_some_and(|deadline| wake >= deadline) {
                        return Err(e);
                    }
                    tokio::time::sleep_until(wake).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn budget_spent(&self, label: &str, attempt: u32) -> CollaboratorError {
        let budget = self.budget.unwrap_or_default();
        tracing::warn!(call = label, attempt, budget_ms = budget.as_millis() as u64, "retry budget spent");
        CollaboratorError::Timeout(budget.as_secs_f64().ceil() as u64)
    }
}

/// Time a node may spend on collaborator calls: three quarters of the step
/// timeout, leaving room for the node's own work.
pub fn call_budget(config: &EngineConfig) -> Duration {
    Duration::from_millis(config.step_timeout_secs.saturating_mul(750))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fetch_error() -> CollaboratorError {
        CollaboratorError::Fetch {
            url: "https://example.com".into(),
            reason: "reset".into(),
        }
    }

    #[test]
    fn should_retry_respects_limit_and_kind() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        assert!(policy.should_retry(1, &fetch_error()));
        assert!(policy.should_retry(2, &fetch_error()));
        assert!(!policy.should_retry(3, &fetch_error()));
        assert!(!policy.should_retry(1, &CollaboratorError::Malformed("x".into())));
    }

    #[tokio::test]
    async fn run_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let result = policy
            .run("fetch", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(fetch_error())
                } else {
                    Ok("page")
                }
            })
            .await;
        assert_eq!(result.unwrap(), "page");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn run_gives_up_when_exhausted() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(1, Duration::ZERO);
        let result: Result<(), _> = policy
            .run("fetch", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(fetch_error())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn run_does_not_retry_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::new(3, Duration::ZERO)
            .run("parse", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CollaboratorError::Malformed("not json".into()))
            })
            .await;
        assert!(matches!(result, Err(CollaboratorError::Malformed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn budget_caps_slow_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::ZERO).with_budget(Duration::from_millis(100));
        let started = Instant::now();
        let result: Result<(), _> = policy
            .run("extract", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(CollaboratorError::Timeout(1))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn call_budget_fits_inside_step_timeout() {
        let config = EngineConfig::default();
        let budget = call_budget(&config);
        assert!(budget < Duration::from_secs(config.step_timeout_secs));
        assert_eq!(RetryPolicy::from_config(&config).budget, Some(budget));
    }
}
