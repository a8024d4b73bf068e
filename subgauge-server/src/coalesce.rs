//! Per-key deduplication of concurrent work.
//!
//! When a cache entry expires under load, every handler invocation for
//! that route would otherwise hit the backing store and the vendor API
//! at once. The coalescer collapses such a burst into one shared
//! computation: the first caller for a key starts the work, everyone
//! else awaits the same future, and all of them observe the same
//! outcome. Once the computation finishes the key is released, so the
//! next call starts fresh; this deduplicates concurrent work only, it
//! caches nothing.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

type SharedOutcome<T, E> = Shared<BoxFuture<'static, Result<T, Arc<E>>>>;

struct Inflight<T, E> {
    shared: SharedOutcome<T, E>,
    generation: u64,
}

/// Deduplicates concurrent computations by key.
///
/// Errors are handed to every waiter in the burst, so they are shared
/// through an [`Arc`]. A caller that goes away does not abort the
/// computation: the remaining waiters (or the next caller for the key)
/// keep driving it to completion.
pub struct Coalescer<T, E> {
    inflight: Mutex<HashMap<String, Inflight<T, E>>>,
    generation: AtomicU64,
}

impl<T, E> Coalescer<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Creates an empty coalescer.
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Runs `work` under `key`, joining an in-flight computation for the
    /// same key if one exists.
    pub async fn run<F>(&self, key: &str, work: F) -> Result<T, Arc<E>>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (shared, generation) = {
            let mut inflight = self.inflight.lock().expect("coalescer lock poisoned");
            match inflight.get(key) {
                Some(entry) => (entry.shared.clone(), entry.generation),
                None => {
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                    let shared = work.map(|r| r.map_err(Arc::new)).boxed().shared();
                    inflight.insert(
                        key.to_string(),
                        Inflight {
                            shared: shared.clone(),
                            generation,
                        },
                    );
                    (shared, generation)
                }
            }
        };

        let outcome = shared.await;

        // Release the key. The generation check keeps a finished burst
        // from evicting a successor computation that already took the
        // slot.
        let mut inflight = self.inflight.lock().expect("coalescer lock poisoned");
        if inflight
            .get(key)
            .is_some_and(|entry| entry.generation == generation)
        {
            inflight.remove(key);
        }

        outcome
    }
}

impl<T, E> Default for Coalescer<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
