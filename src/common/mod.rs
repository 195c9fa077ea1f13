//! Request plumbing shared by the Binance clients
//!
//! - Circuit breaker for fault tolerance
//! - Token-bucket rate limiter
//! - Retry with exponential backoff

pub mod circuit_breaker;
pub mod rate_limiter;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use rate_limiter::RateLimiter;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::config::ExchangeConfig;
use crate::error::ExchangeError;

/// Circuit breaker, rate limiter and retry budget for one client
#[derive(Debug, Clone)]
pub struct RequestPolicy {
    circuit_breaker: Arc<Mutex<CircuitBreaker>>,
    rate_limiter: RateLimiter,
    max_retries: u32,
    base_delay: Duration,
}

impl RequestPolicy {
    pub fn new(config: &ExchangeConfig) -> Self {
        Self {
            circuit_breaker: Arc::new(Mutex::new(CircuitBreaker::new(
                CircuitBreakerConfig::default(),
            ))),
            rate_limiter: RateLimiter::per_second(config.rate_limit as usize),
            max_retries: config.max_retries,
            base_delay: Duration::from_secs(1),
        }
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Arc::new(Mutex::new(CircuitBreaker::new(config)));
        self
    }

    pub async fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.lock().await.state()
    }

    /// Execute a request with retry logic, rate limiting, and circuit breaker
    ///
    /// Backoff doubles from the base delay (1s, 2s, 4s, ...). Errors that a
    /// retry cannot fix are returned immediately.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, ExchangeError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ExchangeError>>,
    {
        if !self.circuit_breaker.lock().await.can_attempt() {
            return Err(ExchangeError::CircuitOpen);
        }

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                tracing::debug!("Retrying after {}ms", delay.as_millis());
                sleep(delay).await;
            }

            self.rate_limiter.acquire().await;

            match operation().await {
                Ok(result) => {
                    self.circuit_breaker.lock().await.record_success();
                    return Ok(result);
                }
                Err(e) if !is_retryable(&e) => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        "Request failed (attempt {}/{}): {}",
                        attempt + 1,
                        self.max_retries + 1,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        self.circuit_breaker.lock().await.record_failure();
        Err(last_error.unwrap_or(ExchangeError::CircuitOpen))
    }
}

/// Transport failures, throttling and server errors are worth another attempt
fn is_retryable(error: &ExchangeError) -> bool {
    match error {
        ExchangeError::Http(_) => true,
        ExchangeError::Api { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_retries: u32) -> RequestPolicy {
        let config = ExchangeConfig {
            max_retries,
            ..ExchangeConfig::default()
        };
        RequestPolicy::new(&config).with_base_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = policy(2)
            .execute(move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ExchangeError::Api {
                        status: 503,
                        message: "busy".to_string(),
                    })
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = policy(3)
            .execute(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ExchangeError::Api {
                    status: 400,
                    message: "bad symbol".to_string(),
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_open_circuit_rejects() {
        let policy = policy(0)
            .with_circuit_breaker(CircuitBreakerConfig::default().with_failure_threshold(1));

        let failing = || async {
            Err::<(), _>(ExchangeError::Api {
                status: 500,
                message: "down".to_string(),
            })
        };
        assert!(policy.execute(failing).await.is_err());
        assert_eq!(policy.circuit_state().await, CircuitState::Open);
        assert!(matches!(
            policy.execute(failing).await,
            Err(ExchangeError::CircuitOpen)
        ));
    }
}
