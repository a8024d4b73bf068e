//! Configuration file model and route construction.
//!
//! The configuration is one YAML file loaded at startup. Provider
//! entries are expanded into the immutable route table: every
//! (route_prefix, subscription) pair becomes one [`Route`] keyed by the
//! joined request path. All validation happens here, before the server
//! binds; a bad configuration never reaches request handling.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use subgauge_core::{ByteUnit, CacheTtls, Credentials, Route, UsageDisplay};
use subgauge_providers::ProviderRegistry;
use tracing::info;

use crate::error::ConfigError;

/// Stock traffic template used when the configured one has no
/// placeholders.
const DEFAULT_TRAFFIC_FORMAT: &str = "⛽ 已用流量 {{.used}} / {{.total}}";

/// Stock expiry template used when the configured one has no
/// placeholders.
const DEFAULT_EXPIRE_FORMAT: &str = "📅 重置日期 {{.year}}-{{.month}}-{{.day}}";

// ============================================================================
// File Model
// ============================================================================

/// Root of the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RootConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
    /// Settings shared by every route.
    #[serde(default)]
    pub global: GlobalConfig,
    /// Per-route defaults, overridable per provider entry.
    #[serde(default)]
    pub defaults: DefaultsConfig,
    /// Provider tag to entry list.
    #[serde(default)]
    pub providers: HashMap<String, Vec<ProviderEntry>>,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address. A bare `:port` binds all interfaces.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Whole-request timeout in seconds.
    #[serde(default = "default_server_timeout")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            timeout_secs: default_server_timeout(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level filter (`error`, `warn`, `info`, `debug`, `trace`).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Settings shared by every route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalConfig {
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Usage display settings.
    #[serde(default)]
    pub usage_display: DisplayConfig,
}

/// Storage settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the subscription documents.
    #[serde(default = "default_subscription_dir")]
    pub subscription_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            subscription_dir: default_subscription_dir(),
        }
    }
}

/// Usage display settings rendered into every route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DisplayConfig {
    /// Master switch for annotation.
    #[serde(default)]
    pub enable: bool,
    /// Insert synthetic groups at the front of the group list.
    #[serde(default)]
    pub prepend: bool,
    /// Traffic group name template.
    #[serde(default)]
    pub traffic_format: String,
    /// Expiry group name template.
    #[serde(default)]
    pub expire_format: String,
    /// Unit traffic values are rendered in (`B`/`K`/`M`/`G`/`T`).
    #[serde(default)]
    pub traffic_unit: String,
}

/// Per-route defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultsConfig {
    /// Cache TTL defaults.
    #[serde(default)]
    pub cache: CacheDefaults,
    /// Provider call defaults.
    #[serde(default)]
    pub provider: ProviderDefaults,
}

/// Cache TTL defaults in seconds. Zero disables a tier.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheDefaults {
    /// File tier TTL.
    #[serde(default)]
    pub file_ttl_secs: u64,
    /// Usage tier TTL.
    #[serde(default)]
    pub usage_ttl_secs: u64,
    /// Response tier TTL.
    #[serde(default = "default_response_ttl")]
    pub response_ttl_secs: u64,
}

impl Default for CacheDefaults {
    fn default() -> Self {
        Self {
            file_ttl_secs: 0,
            usage_ttl_secs: 0,
            response_ttl_secs: default_response_ttl(),
        }
    }
}

/// Provider call defaults in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderDefaults {
    /// Vendor request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Recommended client refresh interval.
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,
}

impl Default for ProviderDefaults {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            update_interval_secs: default_update_interval(),
        }
    }
}

/// One provider entry expanding into one route per subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEntry {
    /// Path prefix the subscriptions are served under.
    #[serde(default)]
    pub route_prefix: String,
    /// Vendor instance identifier.
    #[serde(default)]
    pub api_id: String,
    /// Vendor API key.
    #[serde(default)]
    pub api_key: String,
    /// Subscription filenames served under the prefix.
    #[serde(default)]
    pub subscriptions: Vec<String>,
    /// Optional overrides of the defaults.
    #[serde(default)]
    pub overrides: Option<OverridesConfig>,
}

/// Per-entry overrides of the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverridesConfig {
    /// Cache TTL overrides.
    #[serde(default)]
    pub cache: Option<CacheOverrides>,
    /// Provider call overrides.
    #[serde(default)]
    pub provider: Option<ProviderOverrides>,
}

/// Cache TTL overrides in seconds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheOverrides {
    /// File tier TTL.
    pub file_ttl_secs: Option<u64>,
    /// Usage tier TTL.
    pub usage_ttl_secs: Option<u64>,
    /// Response tier TTL.
    pub response_ttl_secs: Option<u64>,
}

/// Provider call overrides in seconds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderOverrides {
    /// Vendor request timeout. Must be positive.
    pub request_timeout_secs: Option<u64>,
    /// Recommended client refresh interval. Must be positive.
    pub update_interval_secs: Option<u64>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:30103".to_string()
}

fn default_server_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_subscription_dir() -> PathBuf {
    PathBuf::from("./subscriptions")
}

fn default_response_ttl() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    10
}

fn default_update_interval() -> u64 {
    86400
}

// ============================================================================
// Loading & Normalization
// ============================================================================

impl RootConfig {
    /// Loads and normalizes the configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: Self = serde_yaml::from_str(&content)?;
        config.normalize();

        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Applies the normalization the file model cannot express.
    fn normalize(&mut self) {
        if self.server.listen_addr.starts_with(':') {
            self.server.listen_addr = format!("0.0.0.0{}", self.server.listen_addr);
        }

        // explicit zeros at the defaults level fall back to the stock
        // values; only override-level zeros are rejected
        if self.defaults.provider.request_timeout_secs == 0 {
            self.defaults.provider.request_timeout_secs = default_request_timeout();
        }
        if self.defaults.provider.update_interval_secs == 0 {
            self.defaults.provider.update_interval_secs = default_update_interval();
        }

        let display = &mut self.global.usage_display;
        if display.enable {
            if display.traffic_unit.parse::<ByteUnit>().is_err() {
                display.traffic_unit = ByteUnit::G.symbol().to_string();
            }
            if !display.traffic_format.contains("{{.used}}")
                && !display.traffic_format.contains("{{.total}}")
            {
                display.traffic_format = DEFAULT_TRAFFIC_FORMAT.to_string();
            }
            let has_expire_placeholder = ["year", "month", "day", "hour", "minute", "second"]
                .iter()
                .any(|p| display.expire_format.contains(&format!("{{{{.{p}}}}}")));
            if !has_expire_placeholder {
                display.expire_format = DEFAULT_EXPIRE_FORMAT.to_string();
            }
        }
    }

    /// Whole-request timeout as a [`Duration`].
    pub fn server_timeout(&self) -> Duration {
        Duration::from_secs(self.server.timeout_secs)
    }

    // ========================================================================
    // Route Construction
    // ========================================================================

    /// Expands the provider entries into the route table, validating
    /// against `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on an empty providers section, an
    /// unregistered tag, missing entry fields, zero-valued interval
    /// overrides, or duplicate route keys.
    pub fn build_routes(&self, registry: &ProviderRegistry) -> Result<Vec<Route>, ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }

        let display = self.route_display();
        let mut seen = HashSet::new();
        let mut routes = Vec::new();

        for (tag, entries) in &self.providers {
            if !registry.contains(tag) {
                return Err(ConfigError::UnknownProvider(tag.clone()));
            }
            if entries.is_empty() {
                return Err(ConfigError::EmptyProvider(tag.clone()));
            }

            for entry in entries {
                self.validate_entry(tag, entry)?;
                let (cache, request_timeout, update_interval) = self.effective_settings(entry);

                for subscription in &entry.subscriptions {
                    let key = join_route_key(&entry.route_prefix, subscription);
                    if !seen.insert(key.clone()) {
                        return Err(ConfigError::DuplicateRoute(key));
                    }

                    routes.push(Route {
                        key,
                        provider_tag: tag.clone(),
                        credentials: Credentials {
                            api_id: entry.api_id.clone(),
                            api_key: entry.api_key.clone(),
                        },
                        filename: subscription.clone(),
                        cache,
                        request_timeout,
                        update_interval,
                        display: display.clone(),
                    });
                }
            }
        }

        Ok(routes)
    }

    fn validate_entry(&self, tag: &str, entry: &ProviderEntry) -> Result<(), ConfigError> {
        let missing = |field| ConfigError::MissingField {
            field,
            tag: tag.to_string(),
            prefix: entry.route_prefix.clone(),
        };
        if entry.api_id.is_empty() {
            return Err(missing("api_id"));
        }
        if entry.api_key.is_empty() {
            return Err(missing("api_key"));
        }
        if entry.subscriptions.is_empty() || entry.subscriptions.iter().any(String::is_empty) {
            return Err(missing("subscriptions"));
        }

        if let Some(provider) = entry.overrides.as_ref().and_then(|o| o.provider.as_ref()) {
            let zero = |field| ConfigError::ZeroInterval {
                field,
                tag: tag.to_string(),
                prefix: entry.route_prefix.clone(),
            };
            if provider.request_timeout_secs == Some(0) {
                return Err(zero("request_timeout_secs"));
            }
            if provider.update_interval_secs == Some(0) {
                return Err(zero("update_interval_secs"));
            }
        }

        Ok(())
    }

    fn effective_settings(&self, entry: &ProviderEntry) -> (CacheTtls, Duration, Duration) {
        let mut cache = self.defaults.cache.clone();
        let mut provider = self.defaults.provider.clone();

        if let Some(overrides) = &entry.overrides {
            if let Some(c) = &overrides.cache {
                if let Some(v) = c.file_ttl_secs {
                    cache.file_ttl_secs = v;
                }
                if let Some(v) = c.usage_ttl_secs {
                    cache.usage_ttl_secs = v;
                }
                if let Some(v) = c.response_ttl_secs {
                    cache.response_ttl_secs = v;
                }
            }
            if let Some(p) = &overrides.provider {
                if let Some(v) = p.request_timeout_secs {
                    provider.request_timeout_secs = v;
                }
                if let Some(v) = p.update_interval_secs {
                    provider.update_interval_secs = v;
                }
            }
        }

        (
            CacheTtls {
                file: Duration::from_secs(cache.file_ttl_secs),
                usage: Duration::from_secs(cache.usage_ttl_secs),
                response: Duration::from_secs(cache.response_ttl_secs),
            },
            Duration::from_secs(provider.request_timeout_secs),
            Duration::from_secs(provider.update_interval_secs),
        )
    }

    fn route_display(&self) -> UsageDisplay {
        let display = &self.global.usage_display;
        UsageDisplay {
            enabled: display.enable,
            prepend: display.prepend,
            traffic_template: display.traffic_format.clone(),
            expire_template: display.expire_format.clone(),
            traffic_unit: display.traffic_unit.parse().unwrap_or_default(),
        }
    }
}

/// Joins a route prefix and a subscription filename into the request
/// path the route is served under.
fn join_route_key(prefix: &str, filename: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let filename = filename.trim_start_matches('/');
    if prefix.is_empty() {
        format!("/{filename}")
    } else if prefix.starts_with('/') {
        format!("{prefix}/{filename}")
    } else {
        format!("/{prefix}/{filename}")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
server:
  listen_addr: ":30103"
  timeout_secs: 20
log:
  level: debug
global:
  storage:
    subscription_dir: ./subs
  usage_display:
    enable: true
    prepend: true
    traffic_format: "⛽ {{.used}} / {{.total}}"
    expire_format: "📅 {{.year}}-{{.month}}-{{.day}}"
    traffic_unit: "G"
defaults:
  cache:
    response_ttl_secs: 60
  provider:
    request_timeout_secs: 10
providers:
  bandwagonhost:
    - route_prefix: /acme
      api_id: "1234"
      api_key: "secret"
      subscriptions:
        - sub1.yaml
        - sub2.yaml
      overrides:
        cache:
          usage_ttl_secs: 30
"#;

    fn parse(content: &str) -> RootConfig {
        let mut config: RootConfig = serde_yaml::from_str(content).unwrap();
        config.normalize();
        config
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = RootConfig::load(&path).unwrap();
        assert_eq!(config.server.listen_addr, "0.0.0.0:30103");
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.global.storage.subscription_dir, PathBuf::from("./subs"));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = RootConfig::load(Path::new("/nonexistent/config.yml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_defaults_when_sections_omitted() {
        let config = parse("providers: {}\n");

        assert_eq!(config.server.listen_addr, "0.0.0.0:30103");
        assert_eq!(config.server.timeout_secs, 30);
        assert_eq!(config.log.level, "warn");
        assert_eq!(config.defaults.cache.response_ttl_secs, 60);
        assert_eq!(config.defaults.cache.file_ttl_secs, 0);
        assert_eq!(config.defaults.provider.request_timeout_secs, 10);
        assert_eq!(config.defaults.provider.update_interval_secs, 86400);
    }

    #[test]
    fn test_build_routes_expands_subscriptions() {
        let config = parse(SAMPLE);
        let registry = ProviderRegistry::builtin();

        let mut routes = config.build_routes(&registry).unwrap();
        routes.sort_by(|a, b| a.key.cmp(&b.key));

        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].key, "/acme/sub1.yaml");
        assert_eq!(routes[1].key, "/acme/sub2.yaml");
        assert_eq!(routes[0].provider_tag, "bandwagonhost");
        assert_eq!(routes[0].credentials.api_id, "1234");
        assert_eq!(routes[0].filename, "sub1.yaml");
        assert_eq!(routes[0].cache.response, Duration::from_secs(60));
        assert_eq!(routes[0].cache.usage, Duration::from_secs(30));
        assert_eq!(routes[0].cache.file, Duration::ZERO);
        assert_eq!(routes[0].request_timeout, Duration::from_secs(10));
        assert!(routes[0].display.enabled);
        assert!(routes[0].display.prepend);
    }

    #[test]
    fn test_empty_providers_rejected() {
        let config = parse("server:\n  timeout_secs: 5\n");
        let registry = ProviderRegistry::builtin();

        let err = config.build_routes(&registry).unwrap_err();
        assert!(matches!(err, ConfigError::NoProviders));
    }

    #[test]
    fn test_unknown_provider_tag_rejected() {
        let config = parse(
            "providers:\n  vultr:\n    - route_prefix: /a\n      api_id: x\n      api_key: y\n      subscriptions: [s.yaml]\n",
        );
        let registry = ProviderRegistry::builtin();

        let err = config.build_routes(&registry).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProvider(tag) if tag == "vultr"));
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let config = parse(
            "providers:\n  racknerd:\n    - route_prefix: /a\n      api_id: x\n      subscriptions: [s.yaml]\n",
        );
        let registry = ProviderRegistry::builtin();

        let err = config.build_routes(&registry).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "api_key", .. }));
    }

    #[test]
    fn test_missing_subscriptions_rejected() {
        let config = parse(
            "providers:\n  racknerd:\n    - route_prefix: /a\n      api_id: x\n      api_key: y\n",
        );
        let registry = ProviderRegistry::builtin();

        let err = config.build_routes(&registry).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "subscriptions", .. }));
    }

    #[test]
    fn test_zero_interval_override_rejected() {
        let config = parse(
            "providers:\n  racknerd:\n    - route_prefix: /a\n      api_id: x\n      api_key: y\n      subscriptions: [s.yaml]\n      overrides:\n        provider:\n          update_interval_secs: 0\n",
        );
        let registry = ProviderRegistry::builtin();

        let err = config.build_routes(&registry).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ZeroInterval { field: "update_interval_secs", .. }
        ));
    }

    #[test]
    fn test_duplicate_route_key_rejected() {
        let config = parse(
            "providers:\n  racknerd:\n    - route_prefix: /a\n      api_id: x\n      api_key: y\n      subscriptions: [s.yaml, s.yaml]\n",
        );
        let registry = ProviderRegistry::builtin();

        let err = config.build_routes(&registry).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRoute(key) if key == "/a/s.yaml"));
    }

    #[test]
    fn test_display_normalization_falls_back() {
        let config = parse(
            "global:\n  usage_display:\n    enable: true\n    traffic_format: \"no placeholders\"\n    expire_format: \"none either\"\n    traffic_unit: \"Q\"\n",
        );

        let display = &config.global.usage_display;
        assert_eq!(display.traffic_unit, "G");
        assert_eq!(display.traffic_format, DEFAULT_TRAFFIC_FORMAT);
        assert_eq!(display.expire_format, DEFAULT_EXPIRE_FORMAT);
    }

    #[test]
    fn test_disabled_display_not_normalized() {
        let config = parse(
            "global:\n  usage_display:\n    enable: false\n    traffic_unit: \"Q\"\n",
        );
        assert_eq!(config.global.usage_display.traffic_unit, "Q");
    }

    #[test]
    fn test_defaults_level_zero_intervals_normalized() {
        let config = parse("defaults:\n  provider:\n    request_timeout_secs: 0\n");
        assert_eq!(config.defaults.provider.request_timeout_secs, 10);
    }

    #[test]
    fn test_join_route_key_shapes() {
        assert_eq!(join_route_key("/acme", "sub1.yaml"), "/acme/sub1.yaml");
        assert_eq!(join_route_key("/acme/", "/sub1.yaml"), "/acme/sub1.yaml");
        assert_eq!(join_route_key("acme", "sub1.yaml"), "/acme/sub1.yaml");
        assert_eq!(join_route_key("", "sub1.yaml"), "/sub1.yaml");
    }
}
