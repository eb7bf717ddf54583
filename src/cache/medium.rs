//! Cache media: the stores a [`NamespacedCache`](super::NamespacedCache) writes into.
//!
//! A medium may be shared by several namespaced caches. Entries carry an
//! absolute expiration and an optional removal callback that fires exactly
//! once, whatever removed the entry.

use std::any::Any;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use lru::LruCache;
use metrics::counter;
use tracing::debug;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::medium";
const METRIC_CACHE_EVICT_TOTAL: &str = "contextualizer_cache_evict_total";

/// Type-erased cached value.
pub type CachedValue = Arc<dyn Any + Send + Sync>;

/// Invoked with the key and the cause whenever an entry leaves the medium.
pub type RemovalCallback = Arc<dyn Fn(&str, RemovalReason) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Explicitly removed.
    Removed,
    /// Absolute expiration passed.
    Expired,
    /// Pushed out to make room for another entry.
    Evicted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    Never,
    At(Instant),
}

impl Expiration {
    /// Absolute expiration `ttl` from now; a zero `ttl` never expires.
    pub fn after(ttl: Duration) -> Self {
        if ttl.is_zero() {
            Expiration::Never
        } else {
            Expiration::At(Instant::now() + ttl)
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        match self {
            Expiration::Never => false,
            Expiration::At(deadline) => now >= *deadline,
        }
    }
}

pub struct MediumEntry {
    pub value: CachedValue,
    pub expiration: Expiration,
    pub on_removed: Option<RemovalCallback>,
}

impl MediumEntry {
    fn notify(self, key: &str, reason: RemovalReason) {
        if let Some(callback) = self.on_removed {
            callback(key, reason);
        }
    }
}

impl fmt::Debug for MediumEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediumEntry")
            .field("expiration", &self.expiration)
            .field("on_removed", &self.on_removed.is_some())
            .finish_non_exhaustive()
    }
}

/// Backing store for cached values.
///
/// Implementations must invoke an entry's removal callback after releasing
/// their own locks.
pub trait CacheMedium: Send + Sync {
    /// False when there is no usable cache context; callers then compute without caching.
    fn is_available(&self) -> bool {
        true
    }

    /// Live value for `key`; an expired entry is removed and reported as a miss.
    fn get(&self, key: &str) -> Option<CachedValue>;

    /// Store `entry` unless a live entry already exists. Returns whether it was stored.
    fn add(&self, key: &str, entry: MediumEntry) -> bool;

    /// Remove `key`, returning whether an entry was present.
    fn remove(&self, key: &str) -> bool;

    /// Drop every expired entry, returning how many were dropped.
    fn purge_expired(&self) -> usize {
        0
    }

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process medium with LRU eviction.
pub struct MemoryMedium {
    entries: RwLock<LruCache<String, MediumEntry>>,
}

impl MemoryMedium {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
        }
    }
}

impl CacheMedium for MemoryMedium {
    fn get(&self, key: &str) -> Option<CachedValue> {
        let expired = {
            let mut entries = rw_write(&self.entries, SOURCE, "get");
            let is_expired = match entries.peek(key) {
                None => return None,
                Some(entry) => entry.expiration.is_expired(Instant::now()),
            };
            if !is_expired {
                return entries.get(key).map(|entry| Arc::clone(&entry.value));
            }
            entries.pop(key)
        };

        if let Some(entry) = expired {
            debug!(key, "Cache entry expired");
            entry.notify(key, RemovalReason::Expired);
        }
        None
    }

    fn add(&self, key: &str, entry: MediumEntry) -> bool {
        let mut displaced = Vec::new();
        {
            let mut entries = rw_write(&self.entries, SOURCE, "add");
            if let Some(existing) = entries.peek(key) {
                if !existing.expiration.is_expired(Instant::now()) {
                    return false;
                }
                if let Some(stale) = entries.pop(key) {
                    displaced.push((key.to_string(), stale, RemovalReason::Expired));
                }
            }
            if let Some((evicted_key, evicted)) = entries.push(key.to_string(), entry) {
                displaced.push((evicted_key, evicted, RemovalReason::Evicted));
            }
        }

        for (displaced_key, entry, reason) in displaced {
            if reason == RemovalReason::Evicted {
                counter!(METRIC_CACHE_EVICT_TOTAL).increment(1);
                debug!(key = %displaced_key, "Cache entry evicted");
            }
            entry.notify(&displaced_key, reason);
        }
        true
    }

    fn remove(&self, key: &str) -> bool {
        let removed = rw_write(&self.entries, SOURCE, "remove").pop(key);
        match removed {
            Some(entry) => {
                entry.notify(key, RemovalReason::Removed);
                true
            }
            None => false,
        }
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<(String, MediumEntry)> = {
            let mut entries = rw_write(&self.entries, SOURCE, "purge_expired");
            let keys: Vec<String> = entries
                .iter()
                .filter(|(_, entry)| entry.expiration.is_expired(now))
                .map(|(key, _)| key.clone())
                .collect();
            keys.into_iter()
                .filter_map(|key| entries.pop(&key).map(|entry| (key, entry)))
                .collect()
        };

        let count = expired.len();
        for (key, entry) in expired {
            entry.notify(&key, RemovalReason::Expired);
        }
        count
    }

    fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }
}

/// Medium used when no cache context exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableMedium;

impl CacheMedium for UnavailableMedium {
    fn is_available(&self) -> bool {
        false
    }

    fn get(&self, _key: &str) -> Option<CachedValue> {
        None
    }

    fn add(&self, _key: &str, _entry: MediumEntry) -> bool {
        false
    }

    fn remove(&self, _key: &str) -> bool {
        false
    }

    fn len(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::Mutex;

    use super::*;

    type Log = Arc<Mutex<Vec<(String, RemovalReason)>>>;

    fn recording_entry(value: u32, expiration: Expiration, log: &Log) -> MediumEntry {
        let log = Arc::clone(log);
        MediumEntry {
            value: Arc::new(value),
            expiration,
            on_removed: Some(Arc::new(move |key: &str, reason: RemovalReason| {
                log.lock()
                    .expect("log lock")
                    .push((key.to_string(), reason));
            })),
        }
    }

    fn medium(capacity: usize) -> MemoryMedium {
        MemoryMedium::new(NonZeroUsize::new(capacity).expect("non-zero capacity"))
    }

    fn read_u32(medium: &MemoryMedium, key: &str) -> Option<u32> {
        medium
            .get(key)
            .and_then(|value| value.downcast_ref::<u32>().copied())
    }

    #[test]
    fn add_does_not_overwrite_live_entries() {
        let log = Log::default();
        let medium = medium(4);

        assert!(medium.add("k", recording_entry(1, Expiration::Never, &log)));
        assert!(!medium.add("k", recording_entry(2, Expiration::Never, &log)));
        assert_eq!(read_u32(&medium, "k"), Some(1));
        assert!(log.lock().expect("log").is_empty());
    }

    #[test]
    fn expired_entries_miss_and_notify() {
        let log = Log::default();
        let medium = medium(4);
        let past = Expiration::At(Instant::now() - Duration::from_millis(1));

        medium.add("k", recording_entry(1, past, &log));
        assert_eq!(read_u32(&medium, "k"), None);
        assert_eq!(
            log.lock().expect("log").as_slice(),
            &[("k".to_string(), RemovalReason::Expired)]
        );
        assert!(medium.is_empty());
    }

    #[test]
    fn eviction_notifies_the_displaced_entry() {
        let log = Log::default();
        let medium = medium(1);

        medium.add("first", recording_entry(1, Expiration::Never, &log));
        medium.add("second", recording_entry(2, Expiration::Never, &log));

        assert_eq!(read_u32(&medium, "first"), None);
        assert_eq!(read_u32(&medium, "second"), Some(2));
        assert_eq!(
            log.lock().expect("log").as_slice(),
            &[("first".to_string(), RemovalReason::Evicted)]
        );
    }

    #[test]
    fn remove_is_idempotent() {
        let log = Log::default();
        let medium = medium(4);
        medium.add("k", recording_entry(1, Expiration::Never, &log));

        assert!(medium.remove("k"));
        assert!(!medium.remove("k"));
        assert_eq!(log.lock().expect("log").len(), 1);
    }

    #[test]
    fn purge_drops_only_expired_entries() {
        let log = Log::default();
        let medium = medium(4);
        let past = Expiration::At(Instant::now() - Duration::from_millis(1));

        medium.add("stale", recording_entry(1, past, &log));
        medium.add("fresh", recording_entry(2, Expiration::Never, &log));

        assert_eq!(medium.purge_expired(), 1);
        assert_eq!(medium.len(), 1);
        assert_eq!(read_u32(&medium, "fresh"), Some(2));
    }

    #[test]
    fn zero_ttl_never_expires() {
        assert_eq!(Expiration::after(Duration::ZERO), Expiration::Never);
        assert!(matches!(
            Expiration::after(Duration::from_secs(1)),
            Expiration::At(_)
        ));
    }

    #[test]
    fn medium_recovers_from_poisoned_lock() {
        let log = Log::default();
        let medium = medium(4);

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = medium
                .entries
                .write()
                .expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        assert!(medium.add("k", recording_entry(7, Expiration::Never, &log)));
        assert_eq!(read_u32(&medium, "k"), Some(7));
    }

    #[test]
    fn unavailable_medium_stores_nothing() {
        let medium = UnavailableMedium;
        assert!(!medium.is_available());
        assert!(!medium.add(
            "k",
            MediumEntry {
                value: Arc::new(1_u32),
                expiration: Expiration::Never,
                on_removed: None,
            }
        ));
        assert!(medium.get("k").is_none());
    }
}
