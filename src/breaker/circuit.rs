//! Per-endpoint circuit state machine.
//!
//! Pure logic: every transition takes the current time explicitly so the
//! registry can apply it under a single lock acquisition.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::clock::duration_ms;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Calls pass through.
    Closed,
    /// Calls are short-circuited until the cooldown elapses.
    Open,
    /// Trial calls decide whether to close again.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failures that open a closed circuit.
    pub failure_threshold: u32,
    /// Consecutive half-open successes that close the circuit.
    pub success_threshold: u32,
    /// How long an open circuit rejects calls after its last failure.
    pub timeout: Duration,
    /// How often idle records are swept.
    pub sweep_interval: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

/// Whether a call may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Run the operation.
    Allowed,
    /// Moved from open to half-open; run the operation as a trial.
    Probing,
    /// Short-circuit without running the operation.
    Rejected,
}

/// State change produced by recording an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Opened,
    Reopened,
    Closed,
}

/// Failure bookkeeping for one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitRecord {
    pub state: CircuitState,
    pub failure_count: u32,
    /// Unix milliseconds of the last recorded failure, zero if none.
    pub last_failure_time: u64,
    pub success_count: u32,
}

impl Default for CircuitRecord {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: 0,
            success_count: 0,
        }
    }
}

impl CircuitRecord {
    /// Decides whether a call starting at `now` may run.
    pub fn admit(&mut self, now: u64, config: &CircuitBreakerConfig) -> Admission {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => Admission::Allowed,
            CircuitState::Open if self.cooling_down(now, config) => Admission::Rejected,
            CircuitState::Open => {
                self.state = CircuitState::HalfOpen;
                self.success_count = 0;
                Admission::Probing
            }
        }
    }

    /// Records a successful call.
    pub fn record_success(&mut self, config: &CircuitBreakerConfig) -> Option<Transition> {
        if self.state == CircuitState::HalfOpen {
            self.success_count += 1;
            if self.success_count >= config.success_threshold {
                self.state = CircuitState::Closed;
                self.failure_count = 0;
                self.success_count = 0;
                return Some(Transition::Closed);
            }
        } else {
            self.failure_count = self.failure_count.saturating_sub(1);
        }
        None
    }

    /// Records a failed call finishing at `now`.
    pub fn record_failure(&mut self, now: u64, config: &CircuitBreakerConfig) -> Option<Transition> {
        self.failure_count += 1;
        self.last_failure_time = now;

        match self.state {
            CircuitState::HalfOpen => {
                self.state = CircuitState::Open;
                self.success_count = 0;
                Some(Transition::Reopened)
            }
            CircuitState::Closed if self.failure_count >= config.failure_threshold => {
                self.state = CircuitState::Open;
                Some(Transition::Opened)
            }
            _ => None,
        }
    }

    /// True while calls would be short-circuited. Does not transition.
    pub fn is_open_at(&self, now: u64, config: &CircuitBreakerConfig) -> bool {
        self.state == CircuitState::Open && self.cooling_down(now, config)
    }

    /// True when nothing has failed for more than twice the timeout.
    pub fn is_idle(&self, now: u64, config: &CircuitBreakerConfig) -> bool {
        now.saturating_sub(self.last_failure_time) > 2 * duration_ms(config.timeout)
    }

    fn cooling_down(&self, now: u64, config: &CircuitBreakerConfig) -> bool {
        now.saturating_sub(self.last_failure_time) < duration_ms(config.timeout)
    }
}
