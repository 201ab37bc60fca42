//! Response models for the diagnostics endpoints
//!
//! DTOs serialized into the bodies of the `/__shield/*` routes.

pub mod responses;

pub use responses::{HealthCheckResponse, HealthResponse, StatusResponse, WorkerStatus};
