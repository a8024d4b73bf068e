//! RackNerd (SolusVM-style) API client.
//!
//! The panel answers with a single comma-delimited line instead of JSON:
//! `total,used,free,percent` followed by unrelated status text. Only the
//! first two fields are consumed. The API has no expiry concept, so
//! `expire` is always 0.

use std::time::Duration;

use async_trait::async_trait;
use subgauge_core::{Credentials, UpstreamError, UsageInfo, UsageProvider};
use tracing::debug;

use crate::BROWSER_USER_AGENT;

/// Client command endpoint.
const COMMAND_URL: &str = "https://nerdvm.racknerd.com/api/client/command.php";

/// Parses the comma-delimited bandwidth line.
///
/// # Errors
///
/// Returns [`UpstreamError::Parse`] when the line has fewer than four
/// fields or the first two are not integers, and
/// [`UpstreamError::EmptyUsage`] when total or used is not positive.
pub fn parse_bandwidth_line(line: &str) -> Result<UsageInfo, UpstreamError> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() <= 3 {
        return Err(UpstreamError::Parse(format!(
            "invalid bandwidth response: {line}"
        )));
    }

    let total: i64 = fields[0]
        .parse()
        .map_err(|_| UpstreamError::Parse(format!("invalid total field: {}", fields[0])))?;
    let used: i64 = fields[1]
        .parse()
        .map_err(|_| UpstreamError::Parse(format!("invalid used field: {}", fields[1])))?;

    if total <= 0 || used <= 0 {
        return Err(UpstreamError::EmptyUsage);
    }

    Ok(UsageInfo {
        upload: (used / 2) as u64,
        download: (used / 2) as u64,
        total: total as u64,
        expire: 0,
    })
}

/// RackNerd usage client.
#[derive(Debug, Clone)]
pub struct RackNerd {
    http: reqwest::Client,
}

impl RackNerd {
    /// Creates a new client.
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");

        Self { http }
    }
}

impl Default for RackNerd {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UsageProvider for RackNerd {
    async fn fetch_usage(
        &self,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<UsageInfo, UpstreamError> {
        debug!(hash = %credentials.api_id, "fetching racknerd bandwidth info");

        let response = self
            .http
            .get(COMMAND_URL)
            .query(&[
                ("key", credentials.api_key.as_str()),
                ("hash", credentials.api_id.as_str()),
                ("action", "info"),
                ("bw", "true"),
            ])
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| UpstreamError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::Parse(e.to_string()))?;

        parse_bandwidth_line(&body)
    }
}

// ============================================================================
// Tests
// ============================================================================
