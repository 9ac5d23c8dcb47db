//! Circuit breaker around a failing model server
//!
//! Closed until `failure_threshold` consecutive failures, then open for
//! `open_timeout_ms`. The first call after the timeout moves it to half-open;
//! enough successes there close it again, a single failure reopens it.
//!
//! Time comes from the core [`Clock`] so tests can step through the timeout.

use std::sync::Arc;

use chrono::Duration;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use wellstream_core::errors::PredictError;
use wellstream_core::time::{Clock, SystemClock, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before opening
    pub failure_threshold: u32,
    /// Time spent open before a trial call is let through
    pub open_timeout_ms: u64,
    /// Successes in half-open needed to close
    pub half_open_success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout_ms: 30_000,
            half_open_success_threshold: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open { opened_at: Timestamp },
    HalfOpen { successes: u32 },
}

impl CircuitState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open { .. } => "open",
            Self::HalfOpen { .. } => "half_open",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BreakerStats {
    pub total_success: u64,
    pub total_failures: u64,
    /// Calls refused while open
    pub total_rejected: u64,
    pub consecutive_failures: u32,
    pub open_count: u64,
    pub state: &'static str,
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    total_success: u64,
    total_failures: u64,
    total_rejected: u64,
    open_count: u64,
}

pub struct CircuitBreaker {
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        debug!(
            "Circuit breaker failure_threshold={} open_timeout_ms={}",
            config.failure_threshold, config.open_timeout_ms
        );
        Self {
            config,
            clock,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                total_success: 0,
                total_failures: 0,
                total_rejected: 0,
                open_count: 0,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Whether a call may go through right now
    ///
    /// An open circuit whose timeout has elapsed moves to half-open here.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen { .. } => true,
            CircuitState::Open { opened_at } => {
                let timeout = Duration::milliseconds(self.config.open_timeout_ms as i64);
                if self.clock.now() - opened_at >= timeout {
                    info!("Circuit breaker half-open, trying model server");
                    inner.state = CircuitState::HalfOpen { successes: 0 };
                    true
                } else {
                    inner.total_rejected += 1;
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.total_success += 1;
        inner.consecutive_failures = 0;

        if let CircuitState::HalfOpen { successes } = inner.state {
            let successes = successes + 1;
            if successes >= self.config.half_open_success_threshold {
                info!("Circuit breaker closed");
                inner.state = CircuitState::Closed;
            } else {
                inner.state = CircuitState::HalfOpen { successes };
            }
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.total_failures += 1;
        inner.consecutive_failures += 1;

        let trip = match inner.state {
            CircuitState::Closed => inner.consecutive_failures >= self.config.failure_threshold,
            CircuitState::HalfOpen { .. } => true,
            CircuitState::Open { .. } => false,
        };
        if trip {
            warn!(
                "Circuit breaker open after {} consecutive failures",
                inner.consecutive_failures
            );
            inner.state = CircuitState::Open {
                opened_at: self.clock.now(),
            };
            inner.open_count += 1;
        }
    }

    /// Run `f` through the breaker
    ///
    /// Refused calls return [`PredictError::CircuitOpen`] without running `f`.
    pub fn call<T>(
        &self,
        f: impl FnOnce() -> Result<T, PredictError>,
    ) -> Result<T, PredictError> {
        if !self.allow() {
            return Err(PredictError::CircuitOpen);
        }
        match f() {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }

    pub fn stats(&self) -> BreakerStats {
        let inner = self.inner.lock();
        BreakerStats {
            total_success: inner.total_success,
            total_failures: inner.total_failures,
            total_rejected: inner.total_rejected,
            consecutive_failures: inner.consecutive_failures,
            open_count: inner.open_count,
            state: inner.state.name(),
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
