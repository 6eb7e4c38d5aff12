use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Response cache key.
///
/// The viewer is part of the key because pages render per-user navigation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct L1Key {
    pub prefix: String,
    pub path: String,
    pub query_hash: u64,
    pub viewer: Option<i64>,
}

impl L1Key {
    pub fn new(prefix: &str, path: &str, query: &str, viewer: Option<i64>) -> Self {
        Self {
            prefix: prefix.to_string(),
            path: path.to_string(),
            query_hash: hash_query(query),
            viewer,
        }
    }
}

pub fn hash_value<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

pub fn hash_query(query: &str) -> u64 {
    hash_value(&query)
}
