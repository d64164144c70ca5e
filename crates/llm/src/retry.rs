//! Retry layer for external calls
//!
//! Exponential backoff with jitter for transient failures. The pipeline
//! never retries above this layer.

use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::LlmError;

/// Errors that can report whether a retry is worthwhile
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for LlmError {
    fn is_transient(&self) -> bool {
        LlmError::is_transient(self)
    }
}

/// Backoff policy: 100 ms initial, doubling, capped at 60 s, with an
/// overall deadline of 300 s.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
    pub deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(100),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(60),
            deadline: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Run `operation` until it succeeds, fails terminally, or the deadline expires
    pub async fn run<T, E, F, Fut>(&self, op_name: &str, mut operation: F) -> Result<T, E>
    where
        E: Transient + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let mut backoff = self.initial_backoff;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && started.elapsed() + backoff < self.deadline => {
                    let jitter = {
                        let mut rng = rand::thread_rng();
                        rng.gen_range(0.0..=0.1)
                    };
                    let sleep_for = backoff.mul_f64(1.0 + jitter);
                    tracing::warn!(
                        operation = op_name,
                        attempt,
                        backoff_ms = sleep_for.as_millis() as u64,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(sleep_for).await;
                    backoff = backoff.mul_f64(self.multiplier).min(self.max_backoff);
                },
                Err(e) => {
                    if attempt > 1 {
                        tracing::error!(
                            operation = op_name,
                            attempts = attempt,
                            error = %e,
                            "Giving up after retries"
                        );
                    }
                    return Err(e);
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_millis(1),
            ..Default::default()
        };
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = policy
            .run("test", move || {
                let calls = calls_clone.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(LlmError::Network("connection reset".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_terminal_error_not_retried() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<(), _> = policy
            .run("test", move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(LlmError::InvalidResponse("not json".into()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_transient_classification() {
        assert!(LlmError::Timeout.is_transient());
        assert!(LlmError::Api { status: 503, message: String::new() }.is_transient());
        assert!(LlmError::Api { status: 429, message: String::new() }.is_transient());
        assert!(!LlmError::Api { status: 400, message: String::new() }.is_transient());
        assert!(!LlmError::InvalidResponse("x".into()).is_transient());
    }
}
