//! Domain models for subgauge.
//!
//! ## Submodules
//!
//! - [`route`] - Per-route configuration records built once at startup
//! - [`usage`] - Normalized usage statistics and composed responses

mod route;
mod usage;

// Re-export everything at the models level
pub use route::{CacheTtls, Credentials, Route, UsageDisplay};
pub use usage::{ComposedResponse, UsageInfo};
