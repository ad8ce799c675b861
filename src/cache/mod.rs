//! Two-tier statement result caching.
//!
//! - **Session cache**: private to one [`crate::session::Session`], keyed by
//!   [`CacheKey`], cleared on any write in that session and on close.
//! - **Namespace cache**: one bounded cache per declared namespace, shared by
//!   every session, flushed whenever a write statement of that namespace runs.
//!
//! ```toml
//! [namespace_cache]
//! enabled = true
//! capacity = 512
//! eviction_policy = "lru"
//! ```

mod config;
mod keys;
mod lock;
mod namespace;
mod registry;
mod session;

pub use config::{CacheConfig, EvictionPolicy};
pub use keys::CacheKey;
pub use namespace::{Generation, NamespaceCache};
pub use registry::CacheRegistry;
pub use session::SessionCache;

pub(crate) const METRIC_L1_HIT: &str = "mapperlab_cache_l1_hit_total";
pub(crate) const METRIC_L2_HIT: &str = "mapperlab_cache_l2_hit_total";
pub(crate) const METRIC_L2_MISS: &str = "mapperlab_cache_l2_miss_total";
pub(crate) const METRIC_L2_EVICT: &str = "mapperlab_cache_l2_evict_total";
pub(crate) const METRIC_L2_FLUSH: &str = "mapperlab_cache_l2_flush_total";
