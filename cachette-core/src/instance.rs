//! Cache instances: a local tier, a remote tier, or the two composed into a
//! two-level cache.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::config::GlobalConfig;
use crate::local_cache::LocalCache;
use crate::remote::RemoteCache;
use crate::resolver::ResolvedConfig;

#[cfg(feature = "stats")]
use crate::{stats_registry, CacheStats};

/// Bound on values a cache instance can hold.
///
/// `Clone` feeds the local tier (values are stored once and cloned out on
/// hits); `Serialize`/`DeserializeOwned` feed the remote tier and the
/// post-condition `result` binding.
pub trait Cacheable: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Cacheable for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// A runtime cache identified by `(area, name)`.
///
/// Created lazily on first use of a declaration and shared for the process
/// lifetime; all declarations resolving to the same `(area, name)` operate
/// on the same instance.
///
/// # Two-level composition
///
/// With both tiers present, reads try the local tier first and fall through
/// to the remote tier on a miss; a remote hit repopulates the local tier
/// (read-repair). Writes go to both tiers; the local write is best-effort
/// and the remote tier is authoritative. The tiers are not kept atomically
/// consistent; the local tier is advisory and ages out on its own TTL.
///
/// # Failure containment
///
/// Tier failures never reach the caller: a read failure is folded into a
/// miss and a write failure only skips the write. Both are reported through
/// `tracing`.
pub struct CacheInstance {
    area: String,
    name: String,
    local: Option<LocalCache>,
    remote: Option<RemoteCache>,
    #[cfg(feature = "stats")]
    stats: Arc<CacheStats>,
}

impl CacheInstance {
    pub(crate) fn new(
        resolved: &ResolvedConfig,
        global: &GlobalConfig,
    ) -> Result<Self, crate::error::ConfigError> {
        let local = if resolved.cache_type.needs_local() {
            Some(LocalCache::new(
                resolved.local_limit,
                global.local_eviction_policy(),
                resolved.local_expire,
            ))
        } else {
            None
        };

        let remote = if resolved.cache_type.needs_remote() {
            let store = global
                .remote_store(&resolved.area)
                .ok_or_else(|| crate::error::ConfigError::NoRemoteStore(resolved.area.clone()))?;
            Some(RemoteCache::new(
                store,
                resolved.serial_policy,
                format!("{}:", resolved.name),
                resolved.expire,
            ))
        } else {
            None
        };

        #[cfg(feature = "stats")]
        let stats = {
            let stats = Arc::new(CacheStats::new());
            stats_registry::register(&resolved.area, &resolved.name, Arc::clone(&stats));
            stats
        };

        Ok(Self {
            area: resolved.area.clone(),
            name: resolved.name.clone(),
            local,
            remote,
            #[cfg(feature = "stats")]
            stats,
        })
    }

    pub fn area(&self) -> &str {
        &self.area
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up a key. A present entry holding `None` (a cached null) is a
    /// hit with value `None`, distinct from a miss.
    pub fn get<V: Cacheable>(&self, key: &str) -> Option<V> {
        if let Some(local) = &self.local {
            if let Some(stored) = local.get(key) {
                match stored.downcast_ref::<V>() {
                    Some(value) => {
                        self.record_hit();
                        return Some(value.clone());
                    }
                    None => {
                        // A differently-typed declaration shares this
                        // (area, name); drop the stale entry and fall through.
                        warn!(
                            area = %self.area,
                            name = %self.name,
                            "local entry has unexpected type; evicting"
                        );
                        local.remove(key);
                    }
                }
            }
        }

        if let Some(remote) = &self.remote {
            match remote.get::<V>(key) {
                Ok(Some(value)) => {
                    // Read-repair: populate the local tier from a remote hit.
                    if let Some(local) = &self.local {
                        local.insert(key, Arc::new(value.clone()));
                    }
                    self.record_hit();
                    return Some(value);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        area = %self.area,
                        name = %self.name,
                        error = %err,
                        "remote read failed; treating as miss"
                    );
                }
            }
        }

        self.record_miss();
        None
    }

    /// Writes a value to every tier. The caller's result is never affected
    /// by a failed write.
    pub fn put<V: Cacheable>(&self, key: &str, value: &V) {
        if let Some(local) = &self.local {
            local.insert(key, Arc::new(value.clone()));
        }
        if let Some(remote) = &self.remote {
            if let Err(err) = remote.put(key, value) {
                warn!(
                    area = %self.area,
                    name = %self.name,
                    error = %err,
                    "remote write failed; value not cached remotely"
                );
            }
        }
        self.record_put();
    }

    /// Removes a key from every tier.
    pub fn remove(&self, key: &str) {
        if let Some(local) = &self.local {
            local.remove(key);
        }
        if let Some(remote) = &self.remote {
            if let Err(err) = remote.remove(key) {
                warn!(
                    area = %self.area,
                    name = %self.name,
                    error = %err,
                    "remote remove failed"
                );
            }
        }
        self.record_remove();
    }

    #[cfg(feature = "stats")]
    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    fn record_hit(&self) {
        #[cfg(feature = "stats")]
        self.stats.record_hit();
    }

    fn record_miss(&self) {
        #[cfg(feature = "stats")]
        self.stats.record_miss();
    }

    fn record_put(&self) {
        #[cfg(feature = "stats")]
        self.stats.record_put();
    }

    fn record_remove(&self) {
        #[cfg(feature = "stats")]
        self.stats.record_remove();
    }
}
