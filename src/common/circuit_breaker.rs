//! Circuit breaker for exchange requests
//!
//! Trips after `failure_threshold` consecutive exhausted requests and then
//! rejects calls until `timeout` has passed. The first call after that is a
//! trial (half-open); `success_threshold` successful trials close it again,
//! any failed trial trips it anew.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CircuitState {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn with_failure_threshold(self, failure_threshold: u32) -> Self {
        Self {
            failure_threshold,
            ..self
        }
    }

    pub fn with_success_threshold(self, success_threshold: u32) -> Self {
        Self {
            success_threshold,
            ..self
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }
}

/// Breaker phase with the counter that matters in that phase
#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen { successes: u32 },
}

#[derive(Debug)]
pub struct CircuitBreaker {
    phase: Phase,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            phase: Phase::Closed { failures: 0 },
            config,
        }
    }

    pub fn state(&self) -> CircuitState {
        match self.phase {
            Phase::Closed { .. } => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    /// Whether a request may be sent now
    pub fn can_attempt(&mut self) -> bool {
        match self.phase {
            Phase::Open { since } if since.elapsed() < self.config.timeout => false,
            Phase::Open { .. } => {
                info!("Exchange circuit half-open, allowing trial request");
                self.phase = Phase::HalfOpen { successes: 0 };
                true
            }
            Phase::Closed { .. } | Phase::HalfOpen { .. } => true,
        }
    }

    pub fn record_success(&mut self) {
        self.phase = match self.phase {
            Phase::HalfOpen { successes } if successes + 1 >= self.config.success_threshold => {
                info!("Exchange circuit closed after recovery");
                Phase::Closed { failures: 0 }
            }
            Phase::HalfOpen { successes } => Phase::HalfOpen {
                successes: successes + 1,
            },
            Phase::Closed { .. } => Phase::Closed { failures: 0 },
            open @ Phase::Open { .. } => open,
        };
    }

    pub fn record_failure(&mut self) {
        let tripped = Phase::Open {
            since: Instant::now(),
        };

        self.phase = match self.phase {
            Phase::Closed { failures } if failures + 1 >= self.config.failure_threshold => {
                warn!(
                    "Exchange circuit opened after {} consecutive failures",
                    failures + 1
                );
                tripped
            }
            Phase::Closed { failures } => Phase::Closed {
                failures: failures + 1,
            },
            Phase::HalfOpen { .. } => {
                warn!("Exchange circuit re-opened, trial request failed");
                tripped
            }
            Phase::Open { .. } => tripped,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failures: u32, successes: u32, timeout_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            CircuitBreakerConfig::default()
                .with_failure_threshold(failures)
                .with_success_threshold(successes)
                .with_timeout(Duration::from_millis(timeout_ms)),
        )
    }

    #[test]
    fn test_trips_on_consecutive_failures_only() {
        let mut cb = breaker(3, 2, 60_000);

        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.can_attempt());
    }

    #[test]
    fn test_trial_requests_after_timeout() {
        let mut cb = breaker(1, 2, 1);

        cb.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        assert!(cb.can_attempt());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        // A failed trial trips it again
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(5));
        assert!(cb.can_attempt());
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
