// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # subgauge Core
//!
//! Core types, models, and traits for the subgauge subscription server.
//!
//! This crate provides the foundational abstractions used across the other
//! subgauge crates, including:
//!
//! - Domain models (routes, usage statistics, composed responses)
//! - Error types
//! - The [`UsageProvider`] trait that vendor clients implement
//! - Byte-unit formatting for traffic display
//!
//! ## Key Types
//!
//! - [`Route`] - Immutable per-route configuration built at startup
//! - [`UsageInfo`] - Normalized upload/download/total/expiry statistics
//! - [`ComposedResponse`] - Annotated document bytes plus the usage that
//!   produced them
//! - [`ByteUnit`] - Display unit for traffic values

pub mod bytesize;
pub mod error;
pub mod models;
pub mod traits;

// Re-export error types
pub use error::UpstreamError;

// Re-export all model types
pub use models::{
    CacheTtls, ComposedResponse, Credentials, Route, UsageDisplay, UsageInfo,
};

// Re-export units and traits
pub use bytesize::{ByteUnit, format_bytes};
pub use traits::UsageProvider;
