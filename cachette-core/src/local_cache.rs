use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::{CacheEntry, EvictionPolicy};

/// Type-erased value held by the local tier. The owning cache instance
/// downcasts back to the concrete return type on read.
pub type StoredValue = Arc<dyn Any + Send + Sync>;

/// Thread-safe in-process cache tier, bounded by element count.
///
/// The map is protected by a `parking_lot::RwLock` so concurrent reads never
/// block each other; the insertion/recency order lives in a separate
/// `Mutex<VecDeque>`. Entries carry their insertion timestamp and expire on
/// read when the tier has a TTL.
///
/// # Eviction
///
/// When an insert pushes the tier past its limit, one entry is evicted
/// according to the configured policy:
///
/// - **FIFO**: oldest inserted entry (front of the order queue)
/// - **LRU**: least recently accessed entry (hits move keys to the back)
/// - **Random**: a randomly selected entry, O(1) bookkeeping on hits
pub struct LocalCache {
    map: RwLock<HashMap<String, CacheEntry<StoredValue>>>,
    order: Mutex<VecDeque<String>>,
    limit: usize,
    policy: EvictionPolicy,
    ttl: Option<Duration>,
}

impl LocalCache {
    pub fn new(limit: usize, policy: EvictionPolicy, ttl: Option<Duration>) -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            order: Mutex::new(VecDeque::new()),
            limit,
            policy,
            ttl,
        }
    }

    /// Retrieves a value by key, honoring TTL expiration.
    ///
    /// An expired entry is removed and reported as a miss. On an LRU hit the
    /// key moves to the most-recently-used position.
    pub fn get(&self, key: &str) -> Option<StoredValue> {
        let mut result = None;
        let mut expired = false;

        // Read lock only; concurrent readers proceed in parallel.
        {
            let map = self.map.read();
            if let Some(entry) = map.get(key) {
                if entry.is_expired(self.ttl) {
                    expired = true;
                } else {
                    result = Some(entry.value.clone());
                }
            }
        }

        if expired {
            let mut order = self.order.lock();
            let mut map = self.map.write();
            remove_entry(&mut map, &mut order, key);
            return None;
        }

        if result.is_some() && self.policy == EvictionPolicy::LRU {
            move_key_to_end(&mut self.order.lock(), key);
        }

        result
    }

    /// Inserts or replaces a value, evicting per policy when the element
    /// count would exceed the limit.
    pub fn insert(&self, key: &str, value: StoredValue) {
        let key_s = key.to_string();
        self.map.write().insert(key_s.clone(), CacheEntry::new(value));

        let mut order = self.order.lock();
        if let Some(pos) = order.iter().position(|k| *k == key_s) {
            order.remove(pos);
        }
        order.push_back(key_s);

        while order.len() > self.limit {
            let victim = match self.policy {
                // FIFO and LRU both evict the front; hits reorder for LRU
                EvictionPolicy::FIFO | EvictionPolicy::LRU => order.pop_front(),
                EvictionPolicy::Random => {
                    let idx = fastrand::usize(..order.len());
                    order.remove(idx)
                }
            };
            if let Some(victim) = victim {
                self.map.write().remove(&victim);
            }
        }
    }

    pub fn remove(&self, key: &str) {
        let mut order = self.order.lock();
        let mut map = self.map.write();
        remove_entry(&mut map, &mut order, key);
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

fn move_key_to_end(order: &mut VecDeque<String>, key: &str) {
    if let Some(pos) = order.iter().position(|k| k == key) {
        if let Some(k) = order.remove(pos) {
            order.push_back(k);
        }
    }
}

fn remove_entry(
    map: &mut HashMap<String, CacheEntry<StoredValue>>,
    order: &mut VecDeque<String>,
    key: &str,
) {
    map.remove(key);
    if let Some(pos) = order.iter().position(|k| k == key) {
        order.remove(pos);
    }
}
