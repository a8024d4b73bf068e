// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # subgauge Providers
//!
//! Vendor API clients that fetch bandwidth usage for VPS instances, and
//! the registry that dispatches on the provider tag configured per route.
//!
//! Built-in vendors:
//!
//! - [`bandwagonhost`] - JSON `getServiceInfo` API
//! - [`racknerd`] - comma-delimited plaintext SolusVM-style API
//!
//! New vendors implement [`subgauge_core::UsageProvider`] and register
//! under a unique tag via [`ProviderRegistry::register`].

pub mod bandwagonhost;
pub mod racknerd;
mod registry;

pub use bandwagonhost::BandwagonHost;
pub use racknerd::RackNerd;
pub use registry::ProviderRegistry;

/// User-Agent sent to the vendor panels; some of them reject default
/// library agents.
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";
