//! Circuit Breaker Module
//!
//! Stops calling endpoints that keep failing and probes them again after a
//! cooldown.
//!
//! - CLOSED: calls pass through, failures are counted
//! - OPEN: calls are skipped until the cooldown elapses
//! - HALF_OPEN: trial calls decide between CLOSED and OPEN

mod circuit;
mod registry;

#[cfg(test)]
mod property_tests;

pub use circuit::{Admission, CircuitBreakerConfig, CircuitRecord, CircuitState, Transition};
pub use registry::{CircuitBreaker, CircuitStats};
