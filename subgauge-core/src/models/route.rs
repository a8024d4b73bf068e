//! Per-route configuration records.
//!
//! A [`Route`] is assembled once at startup from the configuration file
//! and never mutated afterwards. Handlers look routes up by key and read
//! from them concurrently without locking.

use std::time::Duration;

use crate::bytesize::ByteUnit;

/// Credentials identifying one vendor service instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Instance identifier (`veid` for bandwagonhost, API hash for
    /// racknerd).
    pub api_id: String,
    /// API key.
    pub api_key: String,
}

/// Per-tier cache TTLs.
///
/// A zero duration disables the tier entirely for this route; the tier
/// never gains an entry, it is not cached indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    /// TTL for raw subscription file bytes.
    pub file: Duration,
    /// TTL for fetched usage statistics.
    pub usage: Duration,
    /// TTL for the fully composed response.
    pub response: Duration,
}

/// Usage display settings rendered into synthetic proxy groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageDisplay {
    /// Master switch for annotation.
    pub enabled: bool,
    /// Insert synthetic groups at the front of the group list instead of
    /// appending them.
    pub prepend: bool,
    /// Traffic group name template with `{{.used}}` / `{{.total}}`
    /// placeholders.
    pub traffic_template: String,
    /// Expiry group name template with `{{.year}}` .. `{{.second}}`
    /// placeholders.
    pub expire_template: String,
    /// Unit traffic values are rendered in.
    pub traffic_unit: ByteUnit,
}

impl Default for UsageDisplay {
    fn default() -> Self {
        Self {
            enabled: false,
            prepend: false,
            traffic_template: String::new(),
            expire_template: String::new(),
            traffic_unit: ByteUnit::G,
        }
    }
}

/// One configured subscription route.
#[derive(Debug, Clone)]
pub struct Route {
    /// Globally unique request path this route serves.
    pub key: String,
    /// Registry tag of the vendor serving usage data.
    pub provider_tag: String,
    /// Vendor credentials.
    pub credentials: Credentials,
    /// Subscription filename inside the storage directory.
    pub filename: String,
    /// Cache TTLs for the three tiers.
    pub cache: CacheTtls,
    /// Timeout applied to the vendor usage call.
    pub request_timeout: Duration,
    /// Recommended client refresh interval, surfaced in the
    /// `Profile-Update-Interval` header.
    pub update_interval: Duration,
    /// Synthetic group display settings.
    pub display: UsageDisplay,
}
