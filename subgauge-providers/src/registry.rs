//! Provider registry.
//!
//! The registry maps configured provider tags to client instances. It is
//! built once at startup, validated against the route configuration, and
//! injected into the response assembler; a tag that is not registered is
//! a configuration error, never a runtime surprise.

use std::collections::HashMap;
use std::sync::Arc;

use subgauge_core::UsageProvider;

use crate::bandwagonhost::BandwagonHost;
use crate::racknerd::RackNerd;

/// Registry of vendor usage clients keyed by tag.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn UsageProvider>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in vendors registered.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("bandwagonhost", Arc::new(BandwagonHost::new()));
        registry.register("racknerd", Arc::new(RackNerd::new()));
        registry
    }

    /// Registers a provider under `tag`, replacing any previous entry.
    pub fn register(&mut self, tag: impl Into<String>, provider: Arc<dyn UsageProvider>) {
        self.providers.insert(tag.into(), provider);
    }

    /// Looks up the provider registered under `tag`.
    pub fn get(&self, tag: &str) -> Option<Arc<dyn UsageProvider>> {
        self.providers.get(tag).cloned()
    }

    /// Returns true if `tag` is registered.
    pub fn contains(&self, tag: &str) -> bool {
        self.providers.contains_key(tag)
    }

    /// Returns all registered tags.
    pub fn tags(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }
}
