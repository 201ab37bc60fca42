//! Backend health monitoring.
//!
//! Probes the origin's liveness endpoint, falling back to a diagnostic
//! endpoint, and caches the verdict so callers can ask cheaply and often.

mod monitor;

pub use monitor::{HealthConfig, HealthMonitor, HealthState, HealthStatus};
