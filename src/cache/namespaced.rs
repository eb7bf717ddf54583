//! Namespaced, parameterized TTL cache.
//!
//! Values are populated lazily through caller-supplied callbacks. Population
//! is double-checked under a single per-instance lock, so concurrent first
//! reads of a key run the callback once. Reads of populated keys only touch
//! the medium.

use std::any::Any;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use super::config::CacheConfig;
use super::keys::{Namespace, QualifiedKey};
use super::lock::mutex_lock;
use super::medium::{
    CacheMedium, CachedValue, Expiration, MediumEntry, MemoryMedium, RemovalCallback,
    RemovalReason, UnavailableMedium,
};
use super::registry::{Generation, TrackedKeys};

const SOURCE: &str = "cache::namespaced";
const METRIC_CACHE_HIT_TOTAL: &str = "contextualizer_cache_hit_total";
const METRIC_CACHE_MISS_TOTAL: &str = "contextualizer_cache_miss_total";
const METRIC_CACHE_BYPASS_TOTAL: &str = "contextualizer_cache_bypass_total";
const METRIC_CACHE_POPULATE_MS: &str = "contextualizer_cache_populate_ms";

enum Lookup<T> {
    Hit(T),
    Miss,
    /// The key holds a value of another type.
    Foreign,
}

/// Cache scoped to one namespace on a (possibly shared) medium.
///
/// Populate callbacks must not call back into the same cache instance.
pub struct NamespacedCache {
    namespace: Namespace,
    medium: Arc<dyn CacheMedium>,
    tracked: Arc<TrackedKeys>,
    populate_lock: Mutex<()>,
}

impl NamespacedCache {
    pub fn new(namespace: Namespace, medium: Arc<dyn CacheMedium>) -> Self {
        Self {
            namespace,
            medium,
            tracked: Arc::new(TrackedKeys::new()),
            populate_lock: Mutex::new(()),
        }
    }

    /// Build a cache with its own in-memory medium, or an unavailable one when disabled.
    pub fn from_config(config: &CacheConfig) -> Self {
        let medium: Arc<dyn CacheMedium> = if config.enabled {
            Arc::new(MemoryMedium::new(config.capacity_non_zero()))
        } else {
            Arc::new(UnavailableMedium)
        };
        Self::new(Namespace::new(config.namespace.as_str()), medium)
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn medium(&self) -> &Arc<dyn CacheMedium> {
        &self.medium
    }

    /// Number of keys this instance currently has stored.
    pub fn tracked_len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_tracked(&self, key: &str) -> bool {
        self.tracked.contains(self.namespace.qualify(key).as_str())
    }

    /// Cached value for `key`, populating it without expiration on a miss.
    pub fn get_persistent<T, E, F>(&self, key: &str, populate: F) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        self.get(key, Duration::ZERO, populate)
    }

    /// Cached value for `key`, populating it on a miss.
    ///
    /// A zero `ttl` never expires; otherwise the entry expires `ttl` after it
    /// was stored. A failing `populate` is returned as is and nothing is cached.
    pub fn get<T, E, F>(&self, key: &str, ttl: Duration, populate: F) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        self.get_with_args(key, ttl, |()| populate(), ())
    }

    /// Parameterized variant of [`get`](Self::get): `args` is handed to `populate`.
    pub fn get_with_args<T, A, E, F>(
        &self,
        key: &str,
        ttl: Duration,
        populate: F,
        args: A,
    ) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(A) -> Result<T, E>,
    {
        if !self.medium.is_available() {
            warn!(
                namespace = %self.namespace,
                key,
                "Cache medium unavailable; returning results without caching"
            );
            counter!(METRIC_CACHE_BYPASS_TOTAL).increment(1);
            return populate(args);
        }

        let qualified = self.namespace.qualify(key);
        match self.lookup::<T>(&qualified) {
            Lookup::Hit(value) => {
                counter!(METRIC_CACHE_HIT_TOTAL).increment(1);
                return Ok(value);
            }
            Lookup::Foreign => return self.bypass_foreign(&qualified, populate, args),
            Lookup::Miss => {}
        }

        let _guard = mutex_lock(&self.populate_lock, SOURCE, "populate");

        match self.lookup::<T>(&qualified) {
            Lookup::Hit(value) => {
                counter!(METRIC_CACHE_HIT_TOTAL).increment(1);
                return Ok(value);
            }
            Lookup::Foreign => return self.bypass_foreign(&qualified, populate, args),
            Lookup::Miss => {}
        }

        counter!(METRIC_CACHE_MISS_TOTAL).increment(1);
        self.medium.purge_expired();

        let started = Instant::now();
        let value = populate(args)?;
        histogram!(METRIC_CACHE_POPULATE_MS).record(started.elapsed().as_secs_f64() * 1000.0);

        self.store(qualified, ttl, value.clone());
        Ok(value)
    }

    /// Remove `key` (qualified or not). Returns whether an entry was present.
    pub fn clear(&self, key: &str) -> bool {
        let qualified = self.namespace.qualify(key);
        let _guard = mutex_lock(&self.populate_lock, SOURCE, "clear");
        self.remove_qualified(&qualified)
    }

    /// Remove every entry this instance stored. Returns how many were present.
    pub fn clear_all(&self) -> usize {
        let _guard = mutex_lock(&self.populate_lock, SOURCE, "clear_all");
        let keys = self.tracked.snapshot();
        let cleared = keys
            .iter()
            .map(|key| self.namespace.qualify(key))
            .filter(|key| self.remove_qualified(key))
            .count();

        info!(
            namespace = %self.namespace,
            tracked = keys.len(),
            cleared,
            "Cleared namespaced cache"
        );
        cleared
    }

    fn remove_qualified(&self, key: &QualifiedKey) -> bool {
        let removed = self.medium.remove(key.as_str());
        // Media without removal callbacks still must not leave the key tracked.
        self.tracked.untrack(key.as_str());
        removed
    }

    fn lookup<T>(&self, key: &QualifiedKey) -> Lookup<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        match self.medium.get(key.as_str()) {
            None => Lookup::Miss,
            Some(value) => match value.downcast_ref::<T>() {
                Some(value) => Lookup::Hit(value.clone()),
                None => Lookup::Foreign,
            },
        }
    }

    fn bypass_foreign<T, A, E, F>(&self, key: &QualifiedKey, populate: F, args: A) -> Result<T, E>
    where
        F: FnOnce(A) -> Result<T, E>,
    {
        warn!(
            key = %key,
            expected = std::any::type_name::<T>(),
            "Cached value has an unexpected type; returning results without caching"
        );
        populate(args)
    }

    fn store<T>(&self, key: QualifiedKey, ttl: Duration, value: T)
    where
        T: Send + Sync + 'static,
    {
        let expiration = Expiration::after(ttl);
        let value: CachedValue = Arc::new(value) as Arc<dyn Any + Send + Sync>;

        let generation = self.tracked.track(&key);
        let stored = self.medium.add(
            key.as_str(),
            MediumEntry {
                value,
                expiration,
                on_removed: Some(untrack_on_removal(&self.tracked, generation)),
            },
        );

        if stored {
            debug!(key = %key, ?expiration, "Cached populated value");
        } else {
            self.tracked.untrack_generation(key.as_str(), generation);
            debug!(key = %key, "Medium kept an existing entry; populated value not cached");
        }
    }
}

/// Untracks `key` when its entry leaves the medium, unless the key has since
/// been stored again.
fn untrack_on_removal(tracked: &Arc<TrackedKeys>, generation: Generation) -> RemovalCallback {
    let tracked: Weak<TrackedKeys> = Arc::downgrade(tracked);
    Arc::new(move |key: &str, reason: RemovalReason| {
        let Some(tracked) = tracked.upgrade() else {
            return;
        };
        if tracked.untrack_generation(key, generation) {
            debug!(key, ?reason, "Untracked removed cache key");
        } else {
            debug!(key, ?reason, "Removed entry was superseded; key stays tracked");
        }
    })
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn memory_medium(capacity: usize) -> Arc<dyn CacheMedium> {
        Arc::new(MemoryMedium::new(
            NonZeroUsize::new(capacity).expect("non-zero capacity"),
        ))
    }

    fn cache(capacity: usize) -> NamespacedCache {
        NamespacedCache::new(Namespace::new("test"), memory_medium(capacity))
    }

    fn counting(calls: &AtomicUsize, value: u32) -> Result<u32, String> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }

    #[test]
    fn second_read_is_served_from_cache() {
        let cache = cache(8);
        let calls = AtomicUsize::new(0);

        let first = cache.get_persistent("k", || counting(&calls, 1));
        let second = cache.get_persistent("k", || counting(&calls, 2));

        assert_eq!(first, Ok(1));
        assert_eq!(second, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_tracked("k"));
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = cache(8);

        let failed: Result<u32, String> = cache.get_persistent("k", || Err("boom".to_string()));
        assert_eq!(failed, Err("boom".to_string()));
        assert!(!cache.is_tracked("k"));
        assert!(cache.medium().is_empty());

        let recovered: Result<u32, String> = cache.get_persistent("k", || Ok(5));
        assert_eq!(recovered, Ok(5));
    }

    #[test]
    fn args_are_passed_to_populate() {
        let cache = cache(8);
        let value: Result<String, String> = cache.get_with_args(
            "greeting",
            Duration::ZERO,
            |name: &str| Ok(format!("hello {name}")),
            "menu",
        );
        assert_eq!(value.as_deref(), Ok("hello menu"));
    }

    #[test]
    fn clear_accepts_qualified_and_plain_keys() {
        let cache = cache(8);
        let _: Result<u32, String> = cache.get_persistent("a", || Ok(1));
        let _: Result<u32, String> = cache.get_persistent("b", || Ok(2));

        assert!(cache.clear("a"));
        assert!(cache.clear("test.b"));
        assert!(!cache.clear("a"));
        assert_eq!(cache.tracked_len(), 0);
    }

    #[test]
    fn eviction_untracks_keys() {
        let cache = cache(1);
        let _: Result<u32, String> = cache.get_persistent("a", || Ok(1));
        let _: Result<u32, String> = cache.get_persistent("b", || Ok(2));

        assert!(!cache.is_tracked("a"));
        assert!(cache.is_tracked("b"));
        assert_eq!(cache.tracked_len(), 1);
    }

    #[test]
    fn foreign_typed_values_bypass_the_cache() {
        let cache = cache(8);
        let _: Result<u32, String> = cache.get_persistent("k", || Ok(1));

        let calls = AtomicUsize::new(0);
        let text: Result<String, String> = cache.get_persistent("k", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("text".to_string())
        });

        assert_eq!(text.as_deref(), Ok("text"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let original: Result<u32, String> = cache.get_persistent("k", || Ok(99));
        assert_eq!(original, Ok(1));
    }

    #[test]
    fn unavailable_medium_always_populates() {
        let cache = NamespacedCache::from_config(&CacheConfig {
            enabled: false,
            ..Default::default()
        });
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache.get_persistent("k", || counting(&calls, 7));
            assert_eq!(value, Ok(7));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.tracked_len(), 0);
    }
}
