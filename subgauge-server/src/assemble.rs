//! Per-route response assembly.
//!
//! [`ResponseAssembler`] owns the route table, the tier caches, the
//! coalescer, and the resolved provider per route. One call to
//! [`ResponseAssembler::handle`] produces the complete artifact for a
//! route key; everything behind the route lookup runs inside the
//! coalescer, so a burst of concurrent requests for one expiring route
//! costs a single file read and a single vendor call.

use std::collections::HashMap;
use std::sync::Arc;

use subgauge_core::{ComposedResponse, Route, UsageProvider};
use subgauge_providers::ProviderRegistry;
use tracing::{debug, error, warn};

use crate::annotate::annotate;
use crate::cache::TierCaches;
use crate::coalesce::Coalescer;
use crate::error::{ConfigError, ServeError};
use crate::store::SubscriptionStore;

struct RouteEntry {
    route: Arc<Route>,
    provider: Arc<dyn UsageProvider>,
}

/// Orchestrates cache tiers, backing store, provider fetch, and
/// annotation for every configured route.
pub struct ResponseAssembler {
    routes: HashMap<String, RouteEntry>,
    store: Arc<dyn SubscriptionStore>,
    caches: Arc<TierCaches>,
    coalescer: Coalescer<ComposedResponse, ServeError>,
}

impl std::fmt::Debug for ResponseAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseAssembler")
            .field("routes", &self.routes.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ResponseAssembler {
    /// Builds the assembler, resolving every route's provider tag
    /// against `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownProvider`] for a tag with no
    /// registered client and [`ConfigError::DuplicateRoute`] when two
    /// routes share a key.
    pub fn new(
        routes: Vec<Route>,
        registry: &ProviderRegistry,
        store: Arc<dyn SubscriptionStore>,
        caches: TierCaches,
        coalescer: Coalescer<ComposedResponse, ServeError>,
    ) -> Result<Self, ConfigError> {
        let mut table = HashMap::with_capacity(routes.len());
        for route in routes {
            let provider = registry
                .get(&route.provider_tag)
                .ok_or_else(|| ConfigError::UnknownProvider(route.provider_tag.clone()))?;

            let key = route.key.clone();
            let entry = RouteEntry {
                route: Arc::new(route),
                provider,
            };
            if table.insert(key.clone(), entry).is_some() {
                return Err(ConfigError::DuplicateRoute(key));
            }
        }

        Ok(Self {
            routes: table,
            store,
            caches: Arc::new(caches),
            coalescer,
        })
    }

    /// Returns the route registered under `key`.
    pub fn route(&self, key: &str) -> Option<&Route> {
        self.routes.get(key).map(|entry| entry.route.as_ref())
    }

    /// Returns the cache tiers (read-only introspection).
    pub fn caches(&self) -> &TierCaches {
        &self.caches
    }

    /// Assembles the response for `route_key`.
    ///
    /// # Errors
    ///
    /// [`ServeError::NotFound`] for unknown keys or unreadable backing
    /// files, [`ServeError::Upstream`] when the vendor fetch fails. The
    /// error is shared among every caller of the coalesced burst.
    pub async fn handle(&self, route_key: &str) -> Result<ComposedResponse, Arc<ServeError>> {
        let Some(entry) = self.routes.get(route_key) else {
            debug!(key = route_key, "unknown route key");
            return Err(Arc::new(ServeError::NotFound));
        };

        let work = Self::assemble(
            Arc::clone(&entry.route),
            Arc::clone(&entry.provider),
            Arc::clone(&self.store),
            Arc::clone(&self.caches),
        );
        self.coalescer.run(route_key, work).await
    }

    async fn assemble(
        route: Arc<Route>,
        provider: Arc<dyn UsageProvider>,
        store: Arc<dyn SubscriptionStore>,
        caches: Arc<TierCaches>,
    ) -> Result<ComposedResponse, ServeError> {
        let key = route.key.as_str();

        if let Some(cached) = caches.response.get(key) {
            debug!(key, tier = "response", "cache hit");
            return Ok(cached);
        }

        let (raw, raw_fresh) = match caches.file.get(key) {
            Some(bytes) => {
                debug!(key, tier = "file", "cache hit");
                (bytes, false)
            }
            None => {
                let bytes = store.read(&route.filename).await.map_err(|e| {
                    warn!(key, filename = %route.filename, error = %e, "failed to read subscription file");
                    ServeError::NotFound
                })?;
                (bytes, true)
            }
        };

        let (usage, usage_fresh) = match caches.usage.get(key) {
            Some(usage) => {
                debug!(key, tier = "usage", "cache hit");
                (usage, false)
            }
            None => {
                let usage = provider
                    .fetch_usage(&route.credentials, route.request_timeout)
                    .await
                    .map_err(|e| {
                        error!(key, error = %e, "usage fetch failed");
                        ServeError::Upstream(e)
                    })?;
                (usage, true)
            }
        };

        // A failed assembly caches nothing, so freshly obtained inputs
        // are only stored once both of them are in hand. Refreshing a
        // tier that was served from cache would silently extend its TTL.
        if raw_fresh {
            caches.file.insert(key, raw.clone(), route.cache.file);
        }
        if usage_fresh {
            caches.usage.insert(key, usage.clone(), route.cache.usage);
        }

        // Annotation starts from the raw file bytes on every rebuild so
        // synthetic groups never accumulate across refreshes. A failure
        // here downgrades to serving the original document.
        let body = match annotate(&raw, &usage, &route.display) {
            Ok(body) => body,
            Err(e) => {
                warn!(key, error = %e, "annotation failed, serving original document");
                raw
            }
        };

        let response = ComposedResponse { body, usage };
        caches
            .response
            .insert(key, response.clone(), route.cache.response);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use subgauge_core::{
        ByteUnit, CacheTtls, Credentials, UpstreamError, UsageDisplay, UsageInfo,
    };

    const DOC: &str = "\
proxy-groups:
  - name: \"🚀 节点选择\"
    type: select
    proxies:
      - auto
";

    struct MemStore {
        files: HashMap<String, Vec<u8>>,
        reads: AtomicUsize,
    }

    impl MemStore {
        fn with_doc(filename: &str) -> Arc<Self> {
            let mut files = HashMap::new();
            files.insert(filename.to_string(), DOC.as_bytes().to_vec());
            Arc::new(Self {
                files,
                reads: AtomicUsize::new(0),
            })
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SubscriptionStore for MemStore {
        async fn read(&self, filename: &str) -> io::Result<Vec<u8>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.files
                .get(filename)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "missing"))
        }
    }

    struct StubProvider {
        usage: Option<UsageInfo>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl StubProvider {
        fn with(usage: Option<UsageInfo>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                usage,
                delay,
                calls: AtomicUsize::new(0),
            })
        }

        fn stub_usage() -> UsageInfo {
            UsageInfo {
                upload: 1 << 29,
                download: 1 << 29,
                total: 3 << 30,
                expire: 1_735_689_600,
            }
        }

        fn ok() -> Arc<Self> {
            Self::with(Some(Self::stub_usage()), Duration::ZERO)
        }

        fn slow() -> Arc<Self> {
            Self::with(Some(Self::stub_usage()), Duration::from_millis(100))
        }

        fn failing() -> Arc<Self> {
            Self::with(None, Duration::ZERO)
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UsageProvider for StubProvider {
        async fn fetch_usage(
            &self,
            _credentials: &Credentials,
            _timeout: Duration,
        ) -> Result<UsageInfo, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.usage.clone().ok_or(UpstreamError::EmptyUsage)
        }
    }

    fn test_route(key: &str, ttls: CacheTtls) -> Route {
        Route {
            key: key.to_string(),
            provider_tag: "stub".to_string(),
            credentials: Credentials {
                api_id: "1234".to_string(),
                api_key: "secret".to_string(),
            },
            filename: "sub1.yaml".to_string(),
            cache: ttls,
            request_timeout: Duration::from_secs(10),
            update_interval: Duration::from_secs(86400),
            display: UsageDisplay {
                enabled: true,
                prepend: false,
                traffic_template: "⛽ {{.used}} / {{.total}}".to_string(),
                expire_template: "📅 {{.year}}-{{.month}}-{{.day}}".to_string(),
                traffic_unit: ByteUnit::G,
            },
        }
    }

    fn no_cache() -> CacheTtls {
        CacheTtls {
            file: Duration::ZERO,
            usage: Duration::ZERO,
            response: Duration::ZERO,
        }
    }

    fn cached() -> CacheTtls {
        CacheTtls {
            file: Duration::from_secs(60),
            usage: Duration::from_secs(60),
            response: Duration::from_secs(60),
        }
    }

    fn assembler(
        route: Route,
        provider: Arc<StubProvider>,
        store: Arc<MemStore>,
    ) -> ResponseAssembler {
        let mut registry = ProviderRegistry::new();
        registry.register("stub", provider);
        ResponseAssembler::new(
            vec![route],
            &registry,
            store,
            TierCaches::new(),
            Coalescer::new(),
        )
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_cold_burst_hits_upstream_once() {
        let provider = StubProvider::slow();
        let store = MemStore::with_doc("sub1.yaml");
        let assembler = Arc::new(assembler(
            test_route("/acme/sub1", cached()),
            Arc::clone(&provider),
            Arc::clone(&store),
        ));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let assembler = Arc::clone(&assembler);
            handles.push(tokio::spawn(
                async move { assembler.handle("/acme/sub1").await },
            ));
        }

        let mut bodies = Vec::new();
        for handle in handles {
            bodies.push(handle.await.unwrap().unwrap().body);
        }

        assert_eq!(store.reads(), 1);
        assert_eq!(provider.calls(), 1);
        assert!(bodies.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn test_zero_ttl_tiers_never_gain_entries() {
        let provider = StubProvider::ok();
        let store = MemStore::with_doc("sub1.yaml");
        let assembler = assembler(
            test_route("/acme/sub1", no_cache()),
            Arc::clone(&provider),
            Arc::clone(&store),
        );

        for _ in 0..3 {
            assembler.handle("/acme/sub1").await.unwrap();
        }

        assert!(assembler.caches().file.is_empty());
        assert!(assembler.caches().usage.is_empty());
        assert!(assembler.caches().response.is_empty());
        assert_eq!(store.reads(), 3);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_response_cache_short_circuits() {
        let provider = StubProvider::ok();
        let store = MemStore::with_doc("sub1.yaml");
        let assembler = assembler(
            test_route("/acme/sub1", cached()),
            Arc::clone(&provider),
            Arc::clone(&store),
        );

        let first = assembler.handle("/acme/sub1").await.unwrap();
        let second = assembler.handle("/acme/sub1").await.unwrap();

        assert_eq!(first.body, second.body);
        assert_eq!(store.reads(), 1);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_cached_file_reannotated_from_raw() {
        // file tier caches, response tier does not: every request must
        // re-annotate the raw bytes without accumulating groups
        let ttls = CacheTtls {
            file: Duration::from_secs(60),
            usage: Duration::ZERO,
            response: Duration::ZERO,
        };
        let provider = StubProvider::ok();
        let store = MemStore::with_doc("sub1.yaml");
        let assembler = assembler(
            test_route("/acme/sub1", ttls),
            Arc::clone(&provider),
            Arc::clone(&store),
        );

        let first = assembler.handle("/acme/sub1").await.unwrap();
        let second = assembler.handle("/acme/sub1").await.unwrap();

        assert_eq!(store.reads(), 1);
        assert_eq!(provider.calls(), 2);
        assert_eq!(first.body, second.body);

        let doc: serde_yaml::Value = serde_yaml::from_slice(&second.body).unwrap();
        let groups = doc
            .get("proxy-groups")
            .and_then(serde_yaml::Value::as_sequence)
            .unwrap();
        // one original group plus exactly two synthetic ones
        assert_eq!(groups.len(), 3);
    }

    #[tokio::test]
    async fn test_provider_failure_caches_nothing() {
        let provider = StubProvider::failing();
        let store = MemStore::with_doc("sub1.yaml");
        let assembler = assembler(
            test_route("/acme/sub1", cached()),
            Arc::clone(&provider),
            Arc::clone(&store),
        );

        let err = assembler.handle("/acme/sub1").await.unwrap_err();
        assert!(matches!(*err, ServeError::Upstream(_)));

        // the failed assembly left no entry in any tier, the
        // successfully read file bytes included
        assert!(assembler.caches().file.is_empty());
        assert!(assembler.caches().usage.is_empty());
        assert!(assembler.caches().response.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_route_touches_nothing() {
        let provider = StubProvider::ok();
        let store = MemStore::with_doc("sub1.yaml");
        let assembler = assembler(
            test_route("/acme/sub1", cached()),
            Arc::clone(&provider),
            Arc::clone(&store),
        );

        let err = assembler.handle("/other").await.unwrap_err();
        assert!(matches!(*err, ServeError::NotFound));
        assert_eq!(store.reads(), 0);
        assert_eq!(provider.calls(), 0);
        assert!(assembler.caches().response.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found_before_fetch() {
        let provider = StubProvider::ok();
        let store = MemStore::with_doc("other.yaml");
        let assembler = assembler(
            test_route("/acme/sub1", cached()),
            Arc::clone(&provider),
            Arc::clone(&store),
        );

        let err = assembler.handle("/acme/sub1").await.unwrap_err();
        assert!(matches!(*err, ServeError::NotFound));
        assert_eq!(provider.calls(), 0);
        assert!(assembler.caches().file.is_empty());
    }

    #[tokio::test]
    async fn test_annotation_failure_serves_original() {
        let provider = StubProvider::ok();
        let store = Arc::new(MemStore {
            files: HashMap::from([(
                "sub1.yaml".to_string(),
                b"port: 7890\n".to_vec(),
            )]),
            reads: AtomicUsize::new(0),
        });
        let assembler = assembler(
            test_route("/acme/sub1", cached()),
            Arc::clone(&provider),
            store,
        );

        let response = assembler.handle("/acme/sub1").await.unwrap();
        assert_eq!(response.body, b"port: 7890\n");
        assert_eq!(response.usage.total, 3 << 30);
    }

    #[test]
    fn test_unknown_provider_tag_rejected_at_startup() {
        let registry = ProviderRegistry::new();
        let store = MemStore::with_doc("sub1.yaml");

        let err = ResponseAssembler::new(
            vec![test_route("/acme/sub1", cached())],
            &registry,
            store,
            TierCaches::new(),
            Coalescer::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProvider(tag) if tag == "stub"));
    }

    #[test]
    fn test_duplicate_route_key_rejected_at_startup() {
        let mut registry = ProviderRegistry::new();
        registry.register("stub", StubProvider::ok());
        let store = MemStore::with_doc("sub1.yaml");

        let err = ResponseAssembler::new(
            vec![
                test_route("/acme/sub1", cached()),
                test_route("/acme/sub1", no_cache()),
            ],
            &registry,
            store,
            TierCaches::new(),
            Coalescer::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRoute(key) if key == "/acme/sub1"));
    }
}
