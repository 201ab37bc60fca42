//! Resilient fetch.
//!
//! Requests are plain values carried by pluggable [`Transport`]s. The
//! [`ResilientFetcher`] bounds each attempt with a timeout and falls through
//! the transport ranking when one cannot issue the request.

mod request;
mod resilient;
#[cfg(test)]
pub(crate) mod scripted;
mod transport;

pub use request::{FetchRequest, FetchResponse};
pub use resilient::{ResilientFetcher, DEFAULT_FETCH_TIMEOUT};
pub use transport::{ReqwestTransport, Transport};
