use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_INDEX_TTL_SECS: u64 = 20;
const DEFAULT_KEY_PREFIX: &str = "index_page";
const DEFAULT_RESPONSE_LIMIT: usize = 200;
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Lifetime of a cached home listing.
    pub index_ttl: Duration,
    /// Namespace prepended to every key written by the home listing.
    pub key_prefix: String,
    /// Maximum number of cached responses before LRU eviction.
    pub response_limit: usize,
    /// Responses with larger bodies are served but not stored.
    pub max_body_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            index_ttl: Duration::from_secs(DEFAULT_INDEX_TTL_SECS),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            response_limit: DEFAULT_RESPONSE_LIMIT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            index_ttl: settings.index_ttl,
            key_prefix: settings.key_prefix.clone(),
            response_limit: settings.response_limit.get(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl CacheConfig {
    pub fn response_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.response_limit).unwrap_or(NonZeroUsize::MIN)
    }
}
