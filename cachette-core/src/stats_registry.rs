//! Global registry for cache statistics, keyed `"area/name"`.
//!
//! Each cache instance registers its [`CacheStats`] when it is created, so
//! hit/miss rates can be queried without a handle to the instance itself.
//!
//! # Examples
//!
//! ```
//! use cachette_core::stats_registry;
//!
//! if let Some(stats) = stats_registry::get("default/user-cache") {
//!     println!("hit rate: {:.2}%", stats.hit_rate() * 100.0);
//! }
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::CacheStats;

static STATS_REGISTRY: Lazy<DashMap<String, Arc<CacheStats>>> = Lazy::new(DashMap::new);

/// Registers an instance's statistics. Called when a cache instance is
/// created; an already-registered key keeps its original stats so shared
/// instances stay shared.
pub(crate) fn register(area: &str, name: &str, stats: Arc<CacheStats>) {
    STATS_REGISTRY
        .entry(format!("{area}/{name}"))
        .or_insert(stats);
}

/// Live statistics handle for a cache, or `None` if no instance with that
/// `"area/name"` key has been created yet.
pub fn get(key: &str) -> Option<Arc<CacheStats>> {
    STATS_REGISTRY.get(key).map(|entry| Arc::clone(&entry))
}

/// All registered `"area/name"` keys.
pub fn list() -> Vec<String> {
    STATS_REGISTRY
        .iter()
        .map(|entry| entry.key().clone())
        .collect()
}
