//! Token-bucket rate limiter shared by the exchange clients

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;

/// Token bucket refilled to `max_requests` every `refill_interval`
#[derive(Debug, Clone)]
pub struct RateLimiter {
    permits: Arc<Semaphore>,
    max_requests: usize,
    last_refill: Arc<Mutex<Instant>>,
    refill_interval: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, refill_interval: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_requests)),
            max_requests,
            last_refill: Arc::new(Mutex::new(Instant::now())),
            refill_interval,
        }
    }

    /// `requests_per_second` tokens per one-second window
    pub fn per_second(requests_per_second: usize) -> Self {
        Self::new(requests_per_second.max(1), Duration::from_secs(1))
    }

    /// Wait for and consume one token
    pub async fn acquire(&self) {
        loop {
            if self.try_acquire().await {
                return;
            }
            tokio::time::sleep(self.time_to_refill().await).await;
        }
    }

    /// Consume one token if available
    pub async fn try_acquire(&self) -> bool {
        self.refill().await;
        match self.permits.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    async fn refill(&self) {
        let mut last_refill = self.last_refill.lock().await;
        if last_refill.elapsed() >= self.refill_interval {
            let missing = self
                .max_requests
                .saturating_sub(self.permits.available_permits());
            if missing > 0 {
                self.permits.add_permits(missing);
            }
            *last_refill = Instant::now();
        }
    }

    async fn time_to_refill(&self) -> Duration {
        let last_refill = self.last_refill.lock().await;
        self.refill_interval
            .saturating_sub(last_refill.elapsed())
            .max(Duration::from_millis(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bucket_exhausts() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));

        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(limiter.available_permits(), 0);
        assert!(!limiter.try_acquire().await);
    }

    #[tokio::test]
    async fn test_refills_after_interval() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));

        limiter.acquire().await;
        // Blocks until the next refill instead of failing
        limiter.acquire().await;
        assert_eq!(limiter.available_permits(), 0);
    }

    #[tokio::test]
    async fn test_clones_share_bucket() {
        let a = RateLimiter::per_second(3);
        let b = a.clone();

        a.acquire().await;
        assert_eq!(b.available_permits(), 2);
    }
}
