//! TTL-keyed value caches.
//!
//! One generic [`TtlCache`] per tier instead of one untyped store with
//! key prefixes. Expiry is evaluated lazily on read; there is no
//! background sweep. Size is bounded by the route count, so no eviction
//! policy beyond TTL is needed.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use subgauge_core::{ComposedResponse, UsageInfo};

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// A concurrent TTL cache. Entries are replaced wholesale on insert;
/// concurrent writes to the same key are last-writer-wins.
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
}

impl<V: Clone> TtlCache<V> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Returns the live value for `key`.
    ///
    /// An entry past its expiry instant behaves as absent and is removed
    /// on the way out.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        {
            let entry = self.entries.get(key)?;
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }

        // Expired. The guard must be dropped before removal; re-check the
        // deadline so a concurrent refresh is not thrown away.
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    /// Stores `value` under `key` for `ttl`.
    ///
    /// A zero TTL means this tier is bypassed entirely: the call is a
    /// no-op and the cache never gains an entry.
    pub fn insert(&self, key: &str, value: V, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }

        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Number of entries, including not-yet-collected expired ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// The three cache tiers of the assembly pipeline, keyed by route key.
#[derive(Default)]
pub struct TierCaches {
    /// Raw subscription file bytes.
    pub file: TtlCache<Vec<u8>>,
    /// Fetched usage statistics.
    pub usage: TtlCache<UsageInfo>,
    /// Fully composed responses.
    pub response: TtlCache<ComposedResponse>,
}

impl TierCaches {
    /// Creates the three empty tiers.
    pub fn new() -> Self {
        Self::default()
    }
}
