use std::sync::RwLock;
use std::time::Duration;

use bytes::Bytes;
use lru::LruCache;
use metrics::{counter, gauge};
use tokio::time::Instant;

use super::config::CacheConfig;
use super::keys::L1Key;
use super::lock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

struct Entry {
    response: CachedResponse,
    expires_at: Instant,
}

/// LRU-bounded response store with a per-entry TTL.
pub struct L1Store {
    responses: RwLock<LruCache<L1Key, Entry>>,
}

impl L1Store {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            responses: RwLock::new(LruCache::new(config.response_limit_non_zero())),
        }
    }

    /// Fetch a live entry; expired entries are dropped on the way.
    pub fn get(&self, key: &L1Key) -> Option<CachedResponse> {
        let mut responses = lock::write(&self.responses, "get");
        let expired = match responses.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.response.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            responses.pop(key);
            counter!("yatube_cache_response_expired_total").increment(1);
            gauge!("yatube_cache_response_entries").set(responses.len() as f64);
        }
        None
    }

    /// Store a response for `ttl`. Returns the key evicted to make room, if any.
    pub fn set(&self, key: L1Key, response: CachedResponse, ttl: Duration) -> Option<L1Key> {
        let entry = Entry {
            response,
            expires_at: Instant::now() + ttl,
        };
        let mut responses = lock::write(&self.responses, "set");
        let evicted = responses
            .push(key.clone(), entry)
            .and_then(|(evicted_key, _)| (evicted_key != key).then_some(evicted_key));
        if evicted.is_some() {
            counter!("yatube_cache_response_evict_total").increment(1);
        }
        gauge!("yatube_cache_response_entries").set(responses.len() as f64);
        evicted
    }

    /// Drop every cached response.
    pub fn invalidate_all(&self) {
        lock::write(&self.responses, "invalidate_all").clear();
        counter!("yatube_cache_invalidate_total").increment(1);
        gauge!("yatube_cache_response_entries").set(0.0);
    }

    pub fn len(&self) -> usize {
        lock::read(&self.responses, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
