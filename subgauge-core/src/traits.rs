//! Trait definitions for subgauge.
//!
//! This module defines the capability contract that vendor usage clients
//! must satisfy.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::UpstreamError;
use crate::models::{Credentials, UsageInfo};

/// A vendor client that can fetch usage statistics for one service
/// instance.
///
/// Implementors are responsible for:
/// - Calling the vendor API with the given credentials
/// - Honoring the per-route request timeout
/// - Normalizing the response into a [`UsageInfo`]
///
/// Implementations must fail with [`UpstreamError::EmptyUsage`] when the
/// vendor reports zero totals: an all-zero result would be
/// indistinguishable from a fresh account with no traffic yet.
#[async_trait]
pub trait UsageProvider: Send + Sync {
    /// Fetches current usage for the service identified by `credentials`.
    async fn fetch_usage(
        &self,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<UsageInfo, UpstreamError>;
}
