//! API Module
//!
//! The caching proxy router and its diagnostics endpoints.
//!
//! # Endpoints
//! - `GET /__shield/health` - Proxy liveness
//! - `GET /__shield/status` - Backend verdict, circuits, cache and worker state
//! - `POST /__shield/health/check` - Force a backend health probe
//! - `GET /__shield/content/:section` - Section JSON through the cache
//! - anything else - Proxied through the cache worker

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
