//! Process-wide registry of cache instances, keyed `(area, name)`.
//!
//! Every declaration that resolves to the same pair operates on the same
//! [`CacheInstance`]; explicit shared names are the supported way to have
//! several functions read and invalidate one cache.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::config::GlobalConfig;
use crate::error::ConfigError;
use crate::instance::CacheInstance;
use crate::resolver::ResolvedConfig;

static INSTANCES: Lazy<DashMap<(String, String), Arc<CacheInstance>>> = Lazy::new(DashMap::new);

/// The instance for a resolved declaration, creating it on first use.
///
/// Construction happens at most once per `(area, name)`; concurrent first
/// callers race on the map entry, not on the constructor. A second
/// declaration reaching an existing pair gets the existing instance
/// unchanged, whatever its own attributes say: the first resolution wins.
pub fn get_or_create(
    resolved: &ResolvedConfig,
    global: &GlobalConfig,
) -> Result<Arc<CacheInstance>, ConfigError> {
    let key = (resolved.area.clone(), resolved.name.clone());
    if let Some(existing) = INSTANCES.get(&key) {
        return Ok(Arc::clone(&existing));
    }
    let entry = INSTANCES
        .entry(key)
        .or_try_insert_with(|| CacheInstance::new(resolved, global).map(Arc::new))?;
    Ok(Arc::clone(&entry))
}

/// Looks up an existing instance without creating one. Used by invalidation,
/// which has nothing to remove from a cache that was never populated.
pub fn lookup(area: &str, name: &str) -> Option<Arc<CacheInstance>> {
    INSTANCES
        .get(&(area.to_string(), name.to_string()))
        .map(|entry| Arc::clone(&entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheDeclaration, CacheType};
    use crate::resolver;

    fn resolved(name: &'static str, global: &GlobalConfig) -> ResolvedConfig {
        let decl = CacheDeclaration {
            area: "registry-test",
            name: Some(name),
            enabled: None,
            expire: None,
            local_expire: None,
            cache_type: CacheType::Local,
            local_limit: None,
            serial_policy: None,
            key_convertor: None,
            key: None,
            cache_null_value: None,
            condition: None,
            post_condition: None,
            module_path: "registry_test",
            function: name,
            file: "registry_test.rs",
            line: 0,
        };
        resolver::resolve_uncached(&decl, global).expect("resolves")
    }

    #[test]
    fn test_same_pair_returns_same_instance() {
        let global = GlobalConfig::builder().build();
        let resolved = resolved("same-pair", &global);
        let first = get_or_create(&resolved, &global).unwrap();
        let second = get_or_create(&resolved, &global).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_first_resolution_wins() {
        let global = GlobalConfig::builder().build();
        let first = get_or_create(&resolved("first-wins", &global), &global).unwrap();

        let mut later = resolved("first-wins", &global);
        later.local_limit = 5;
        let second = get_or_create(&later, &global).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_lookup_does_not_create() {
        let global = GlobalConfig::builder().build();
        assert!(lookup("registry-test", "never-created").is_none());
        let created = get_or_create(&resolved("lookup-me", &global), &global).unwrap();
        let found = lookup("registry-test", "lookup-me").expect("created above");
        assert!(Arc::ptr_eq(&created, &found));
    }
}
