//! Remote tier: the [`RemoteStore`] boundary trait, the serializing
//! [`RemoteCache`] wrapper bound to one cache instance, and the in-memory
//! [`MemoryStore`] used by tests and examples.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::TierError;
use crate::serial::SerialPolicy;

/// External key-value store backing the remote tier of one or more areas.
///
/// Implementations wrap a concrete transport (a Redis client, a test double,
/// ...). Keys and values arrive already reduced to serialized form; the
/// store only moves bytes. All methods must be safe under arbitrary
/// concurrent access.
pub trait RemoteStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, TierError>;

    /// Stores a value. `ttl = None` means the entry never expires.
    fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), TierError>;

    fn remove(&self, key: &str) -> Result<(), TierError>;
}

/// In-process [`RemoteStore`] with TTL support.
///
/// Stands in for a real remote transport in tests, examples and
/// single-process deployments.
///
/// # Examples
///
/// ```
/// use cachette_core::{MemoryStore, RemoteStore};
///
/// let store = MemoryStore::new();
/// store.put("k", b"v".to_vec(), None).unwrap();
/// assert_eq!(store.get("k").unwrap(), Some(b"v".to_vec()));
/// ```
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, StoredBytes>,
}

struct StoredBytes {
    bytes: Vec<u8>,
    expires_at: Option<Instant>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

impl RemoteStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, TierError> {
        let expired = match self.entries.get(key) {
            Some(entry) => match entry.expires_at {
                Some(deadline) if Instant::now() >= deadline => true,
                _ => return Ok(Some(entry.bytes.clone())),
            },
            None => return Ok(None),
        };
        if expired {
            self.entries.remove(key);
        }
        Ok(None)
    }

    fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), TierError> {
        self.entries.insert(
            key.to_string(),
            StoredBytes {
                bytes: value,
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), TierError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Remote tier of one cache instance: a [`RemoteStore`] plus the instance's
/// serialization policy, key prefix and TTL.
///
/// The cache name is prepended to every key so instances in the same area
/// can share one store without colliding.
pub struct RemoteCache {
    store: std::sync::Arc<dyn RemoteStore>,
    serial: SerialPolicy,
    prefix: String,
    ttl: Option<Duration>,
}

impl RemoteCache {
    pub fn new(
        store: std::sync::Arc<dyn RemoteStore>,
        serial: SerialPolicy,
        prefix: String,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            store,
            serial,
            prefix,
            ttl,
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub fn get<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>, TierError> {
        match self.store.get(&self.full_key(key))? {
            Some(bytes) => Ok(Some(self.serial.deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put<V: Serialize>(&self, key: &str, value: &V) -> Result<(), TierError> {
        let bytes = self.serial.serialize(value)?;
        self.store.put(&self.full_key(key), bytes, self.ttl)
    }

    pub fn remove(&self, key: &str) -> Result<(), TierError> {
        self.store.remove(&self.full_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_memory_store_ttl() {
        let store = MemoryStore::new();
        store
            .put("k", b"v".to_vec(), Some(Duration::from_millis(20)))
            .unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"v".to_vec()));
        thread::sleep(Duration::from_millis(40));
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_memory_store_remove() {
        let store = MemoryStore::new();
        store.put("k", b"v".to_vec(), None).unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_remote_cache_round_trip_and_prefix() {
        let store = Arc::new(MemoryStore::new());
        let cache = RemoteCache::new(
            Arc::clone(&store) as Arc<dyn RemoteStore>,
            SerialPolicy::Json,
            "users:".to_string(),
            None,
        );
        cache.put("42", &vec!["a".to_string(), "b".to_string()]).unwrap();
        // the instance name prefixes the raw store key
        assert!(store.contains_key("users:42"));
        let back: Option<Vec<String>> = cache.get("42").unwrap();
        assert_eq!(back, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_remote_cache_corrupt_payload_is_tier_error() {
        let store = Arc::new(MemoryStore::new());
        store.put("c:1", b"garbage".to_vec(), None).unwrap();
        let cache = RemoteCache::new(
            store as Arc<dyn RemoteStore>,
            SerialPolicy::Json,
            "c:".to_string(),
            None,
        );
        let result: Result<Option<Vec<u8>>, _> = cache.get("1");
        assert!(result.is_err());
    }
}
