//! Contextualizer cache system
//!
//! A namespaced, parameterized TTL cache used to memoize command registries:
//!
//! - **Medium**: the backing store (`MemoryMedium`, bounded LRU with absolute
//!   expiration), possibly shared by several namespaces
//! - **Namespaced cache**: qualifies keys, populates on miss under a
//!   double-checked lock, and tracks the keys it stored for `clear_all`
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! namespace = "Contextualizer.ContextualMenu"
//! capacity = 256
//! registry_ttl_seconds = 480
//! ```

mod config;
mod keys;
mod lock;
mod medium;
mod namespaced;
mod registry;

pub use config::{CacheConfig, DEFAULT_NAMESPACE};
pub use keys::{Namespace, QualifiedKey};
pub use medium::{
    CacheMedium, CachedValue, Expiration, MediumEntry, MemoryMedium, RemovalCallback,
    RemovalReason, UnavailableMedium,
};
pub use namespaced::NamespacedCache;
pub use registry::{Generation, TrackedKeys};
