//! Cache-aware fetch facade.

mod facade;

pub use facade::{CachedFetcher, PreloadTarget, SharedJsonCache};
