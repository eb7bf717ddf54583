//! Cache configuration.
//!
//! Controls the command-registry cache via the `[cache]` table of
//! `contextualizer.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

pub const DEFAULT_NAMESPACE: &str = "Contextualizer.ContextualMenu";
const DEFAULT_CAPACITY: usize = 256;
const DEFAULT_REGISTRY_TTL_SECS: u64 = 8 * 60;

/// Cache configuration resolved from [`CacheSettings`](crate::config::CacheSettings).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false the cache medium is unavailable and every lookup is computed directly.
    pub enabled: bool,
    /// Prefix applied to every key this process stores.
    pub namespace: String,
    /// Maximum entries held by the in-memory medium before LRU eviction.
    pub capacity: usize,
    /// Absolute lifetime of a cached command registry.
    pub registry_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: DEFAULT_NAMESPACE.to_string(),
            capacity: DEFAULT_CAPACITY,
            registry_ttl_seconds: DEFAULT_REGISTRY_TTL_SECS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            namespace: settings.namespace.clone(),
            capacity: settings.capacity,
            registry_ttl_seconds: settings.registry_ttl.as_secs(),
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Registry lifetime; zero means entries never expire.
    pub fn registry_ttl(&self) -> Duration {
        Duration::from_secs(self.registry_ttl_seconds)
    }
}
