//! Tracked-key registry.
//!
//! Records every qualified key a namespaced cache has stored so that bulk
//! invalidation only touches this cache's entries on a shared medium.
//!
//! Each `track` hands out a fresh generation. Removal notifications carry the
//! generation of the entry they belong to, so a late notification for a
//! replaced entry cannot untrack its successor.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use super::keys::QualifiedKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::registry";

/// Identifies one stored entry of a tracked key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Generation(u64);

#[derive(Debug, Default)]
pub struct TrackedKeys {
    keys: RwLock<HashMap<String, Generation>>,
    next: AtomicU64,
}

impl TrackedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a key, superseding any earlier generation of it.
    pub fn track(&self, key: &QualifiedKey) -> Generation {
        let generation = Generation(self.next.fetch_add(1, Ordering::Relaxed));
        rw_write(&self.keys, SOURCE, "track").insert(key.as_str().to_string(), generation);
        generation
    }

    /// Stop tracking a key whatever its generation. Returns false if it was not tracked.
    pub fn untrack(&self, key: &str) -> bool {
        rw_write(&self.keys, SOURCE, "untrack").remove(key).is_some()
    }

    /// Stop tracking a key only while `generation` is still the current one.
    pub fn untrack_generation(&self, key: &str, generation: Generation) -> bool {
        let mut keys = rw_write(&self.keys, SOURCE, "untrack_generation");
        if keys.get(key) == Some(&generation) {
            keys.remove(key);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        rw_read(&self.keys, SOURCE, "contains").contains_key(key)
    }

    /// Copy of the tracked keys, so callers can remove entries without holding the lock.
    pub fn snapshot(&self) -> Vec<String> {
        rw_read(&self.keys, SOURCE, "snapshot")
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        rw_read(&self.keys, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
