//! Short-lived full-response cache.
//!
//! Wraps selected GET routes (the home listing) and replays the rendered
//! response until its TTL elapses or the cache is cleared explicitly.
//!
//! ```toml
//! [cache]
//! enabled = true
//! index_ttl_seconds = 20
//! key_prefix = "index_page"
//! response_limit = 200
//! ```

mod config;
mod keys;
mod lock;
mod middleware;
mod store;

pub use config::CacheConfig;
pub use keys::{L1Key, hash_query, hash_value};
pub use middleware::{CacheState, response_cache_layer};
pub use store::{CachedResponse, L1Store};
