//! BandwagonHost (64clouds) API client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use subgauge_core::{Credentials, UpstreamError, UsageInfo, UsageProvider};
use tracing::debug;

use crate::BROWSER_USER_AGENT;

/// Service info endpoint.
const SERVICE_INFO_URL: &str = "https://api.64clouds.com/v1/getServiceInfo";

// ============================================================================
// API Response Types
// ============================================================================

/// Subset of the `getServiceInfo` response the usage pipeline consumes.
/// The full payload carries dozens of plan/node fields that are ignored.
#[derive(Debug, Deserialize)]
pub struct ServiceInfo {
    /// Monthly plan quota in bytes, before the multiplier.
    #[serde(default)]
    pub plan_monthly_data: i64,
    /// Multiplier applied to both quota and counter.
    #[serde(default)]
    pub monthly_data_multiplier: i64,
    /// Consumed bytes this cycle, before the multiplier.
    #[serde(default)]
    pub data_counter: i64,
    /// Epoch seconds of the next counter reset.
    #[serde(default)]
    pub data_next_reset: i64,
}

impl ServiceInfo {
    /// Normalizes the vendor payload into a [`UsageInfo`].
    ///
    /// The vendor does not separate upload from download, so the
    /// multiplied counter is split evenly between the two fields.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::EmptyUsage`] when the multiplied total or
    /// used amount is not positive.
    pub fn to_usage(&self) -> Result<UsageInfo, UpstreamError> {
        let half = self.data_counter * self.monthly_data_multiplier / 2;
        let total = self.plan_monthly_data * self.monthly_data_multiplier;

        if total <= 0 || half <= 0 {
            return Err(UpstreamError::EmptyUsage);
        }

        Ok(UsageInfo {
            upload: half as u64,
            download: half as u64,
            total: total as u64,
            expire: self.data_next_reset,
        })
    }
}

// ============================================================================
// Provider
// ============================================================================

/// BandwagonHost usage client.
#[derive(Debug, Clone)]
pub struct BandwagonHost {
    http: reqwest::Client,
}

impl BandwagonHost {
    /// Creates a new client.
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");

        Self { http }
    }
}

impl Default for BandwagonHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UsageProvider for BandwagonHost {
    async fn fetch_usage(
        &self,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<UsageInfo, UpstreamError> {
        debug!(veid = %credentials.api_id, "fetching bandwagonhost service info");

        let response = self
            .http
            .get(SERVICE_INFO_URL)
            .query(&[
                ("veid", credentials.api_id.as_str()),
                ("api_key", credentials.api_key.as_str()),
            ])
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| UpstreamError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let info: ServiceInfo = response
            .json()
            .await
            .map_err(|e| UpstreamError::Parse(e.to_string()))?;

        info.to_usage()
    }
}

// ============================================================================
// Tests
// ============================================================================
