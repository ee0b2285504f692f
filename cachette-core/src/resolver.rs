//! Declaration resolution: merges a [`CacheDeclaration`] with the global
//! defaults into an immutable [`ResolvedConfig`], memoized per declaration
//! identity so the cost is paid once per site rather than once per call.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::config::{CacheDeclaration, CacheType, DeclarationId, GlobalConfig};
use crate::error::ConfigError;
use crate::key::KeyConvertor;
use crate::serial::SerialPolicy;

/// A declaration with every unset attribute replaced by its global default
/// or hard-coded fallback. Plain data, comparable, immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub area: String,
    pub name: String,
    pub enabled: bool,
    /// Remote-tier TTL (and local-tier TTL for `Local` caches). `None`
    /// means no expiration.
    pub expire: Option<Duration>,
    /// Local-tier TTL. Inherits `expire` when the declaration leaves
    /// `local_expire` unset.
    pub local_expire: Option<Duration>,
    pub cache_type: CacheType,
    pub local_limit: usize,
    pub serial_policy: SerialPolicy,
    pub key_convertor: KeyConvertor,
    pub key: Option<String>,
    pub cache_null_value: bool,
    pub condition: Option<String>,
    pub post_condition: Option<String>,
}

static RESOLVED: Lazy<DashMap<DeclarationId, Arc<ResolvedConfig>>> = Lazy::new(DashMap::new);

struct NameClaim {
    id: DeclarationId,
    auto_derived: bool,
}

static CLAIMED_NAMES: Lazy<DashMap<(String, String), NameClaim>> = Lazy::new(DashMap::new);

/// Resolves a declaration against the global configuration.
///
/// Pure and deterministic given its inputs; memoized by declaration
/// identity. Unknown policy names and missing remote stores surface here,
/// never at call time. Failures are not memoized: the caller latches them
/// per site. Name claiming is a separate step (`claim_name`) taken only
/// once the whole site is known to be viable.
pub fn resolve(
    declaration: &CacheDeclaration,
    global: &GlobalConfig,
) -> Result<Arc<ResolvedConfig>, ConfigError> {
    let id = declaration.id();
    if let Some(hit) = RESOLVED.get(&id) {
        return Ok(Arc::clone(&hit));
    }
    let resolved = Arc::new(resolve_uncached(declaration, global)?);
    Ok(Arc::clone(&RESOLVED.entry(id).or_insert(resolved)))
}

/// The merge itself, without memoization or name claiming.
pub(crate) fn resolve_uncached(
    declaration: &CacheDeclaration,
    global: &GlobalConfig,
) -> Result<ResolvedConfig, ConfigError> {
    let serial_name: &str = match declaration.serial_policy {
        Some(name) => name,
        None => global.default_serial_policy(),
    };
    let serial_policy = SerialPolicy::from_name(serial_name)?;

    let convertor_name: &str = match declaration.key_convertor {
        Some(name) => name,
        None => global.default_key_convertor(),
    };
    let key_convertor = KeyConvertor::from_name(convertor_name)?;

    let area = declaration.area.to_string();
    let name = match declaration.name {
        Some(name) => name.to_string(),
        None => auto_derive_name(declaration, global.hidden_packages()),
    };

    if declaration.cache_type.needs_remote() && global.remote_store(&area).is_none() {
        return Err(ConfigError::NoRemoteStore(area));
    }

    let expire = declaration
        .expire
        .or(global.default_expire())
        .map(Duration::from_secs);
    // Open question from the declaration surface: the local tier inherits
    // the remote TTL when local_expire is unset.
    let local_expire = declaration
        .local_expire
        .map(Duration::from_secs)
        .or(expire);

    Ok(ResolvedConfig {
        area,
        name,
        enabled: declaration.enabled.unwrap_or(global.default_enabled()),
        expire,
        local_expire,
        cache_type: declaration.cache_type,
        local_limit: declaration
            .local_limit
            .unwrap_or(global.default_local_limit()),
        serial_policy,
        key_convertor,
        key: declaration.key.map(str::to_string),
        cache_null_value: declaration
            .cache_null_value
            .unwrap_or(global.default_cache_null_value()),
        condition: declaration.condition.map(str::to_string),
        post_condition: declaration.post_condition.map(str::to_string),
    })
}

/// Derives a stable cache name from the declaring module path and function
/// name, with configured hidden prefixes stripped so renames of enclosing
/// packages don't change the name.
pub fn auto_derive_name(declaration: &CacheDeclaration, hidden_packages: &[String]) -> String {
    let path = declaration.module_path;
    let mut stripped = 0;
    for prefix in hidden_packages {
        if path.starts_with(prefix.as_str()) && prefix.len() > stripped {
            stripped = prefix.len();
        }
    }
    let path = path[stripped..].trim_start_matches("::");
    if path.is_empty() {
        declaration.function.to_string()
    } else {
        format!("{}::{}", path, declaration.function)
    }
}

/// Records which declaration claimed an `(area, name)` pair.
///
/// Two distinct declarations may share an explicit name (that is the
/// documented way to share a cache instance), but a collision involving an
/// auto-derived name means hidden-prefix stripping made two different
/// functions ambiguous, which is a configuration error.
///
/// Called by the engine only after the site's expressions compiled, so a
/// site that latches disabled never holds a claim against a later,
/// legitimate site.
pub(crate) fn claim_name(
    declaration: &CacheDeclaration,
    resolved: &ResolvedConfig,
) -> Result<(), ConfigError> {
    use dashmap::mapref::entry::Entry;

    let id = declaration.id();
    let auto_derived = declaration.name.is_none();
    let key = (resolved.area.clone(), resolved.name.clone());
    match CLAIMED_NAMES.entry(key) {
        Entry::Vacant(entry) => {
            entry.insert(NameClaim { id, auto_derived });
            Ok(())
        }
        Entry::Occupied(entry) => {
            let claim = entry.get();
            if claim.id == id || (!claim.auto_derived && !auto_derived) {
                Ok(())
            } else {
                Err(ConfigError::NameCollision {
                    area: resolved.area.clone(),
                    name: resolved.name.clone(),
                    first: claim.id.to_string(),
                    second: id.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GlobalConfig;
    use crate::remote::MemoryStore;

    fn declaration(module_path: &'static str, function: &'static str) -> CacheDeclaration {
        CacheDeclaration {
            area: "default",
            name: None,
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
            module_path,
            function,
            file: "resolver_test.rs",
            line: 0,
        }
    }

    #[test]
    fn test_hard_coded_fallbacks() {
        let global = GlobalConfig::builder().build();
        let resolved =
            resolve_uncached(&declaration("app::fallbacks", "f"), &global).unwrap();
        assert!(resolved.enabled);
        assert_eq!(resolved.expire, None); // infinite
        assert_eq!(resolved.local_limit, crate::config::DEFAULT_LOCAL_LIMIT);
        assert_eq!(resolved.serial_policy, SerialPolicy::Json);
        assert_eq!(resolved.key_convertor, KeyConvertor::Json);
        assert!(!resolved.cache_null_value);
    }

    #[test]
    fn test_declaration_wins_over_global() {
        let global = GlobalConfig::builder()
            .default_expire(300)
            .default_local_limit(50)
            .default_cache_null_value(true)
            .build();
        let mut decl = declaration("app::wins", "f");
        decl.expire = Some(60);
        decl.local_limit = Some(10);
        decl.cache_null_value = Some(false);
        let resolved = resolve_uncached(&decl, &global).unwrap();
        assert_eq!(resolved.expire, Some(Duration::from_secs(60)));
        assert_eq!(resolved.local_limit, 10);
        assert!(!resolved.cache_null_value);
    }

    #[test]
    fn test_global_fills_unset() {
        let global = GlobalConfig::builder()
            .default_expire(300)
            .default_serial_policy("bincode")
            .build();
        let resolved = resolve_uncached(&declaration("app::fills", "f"), &global).unwrap();
        assert_eq!(resolved.expire, Some(Duration::from_secs(300)));
        assert_eq!(resolved.serial_policy, SerialPolicy::Bincode);
    }

    #[test]
    fn test_local_expire_inherits_expire() {
        let global = GlobalConfig::builder().build();
        let mut decl = declaration("app::inherit", "f");
        decl.expire = Some(120);
        let resolved = resolve_uncached(&decl, &global).unwrap();
        assert_eq!(resolved.local_expire, Some(Duration::from_secs(120)));

        decl.function = "g";
        decl.local_expire = Some(30);
        let resolved = resolve_uncached(&decl, &global).unwrap();
        assert_eq!(resolved.local_expire, Some(Duration::from_secs(30)));
        assert_eq!(resolved.expire, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let global = GlobalConfig::builder().default_expire(60).build();
        let mut decl = declaration("app::idempotent", "f");
        decl.condition = Some("id > 0");
        let first = resolve_uncached(&decl, &global).unwrap();
        let second = resolve_uncached(&decl, &global).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_memoized_resolution_returns_same_arc() {
        let global = GlobalConfig::builder().build();
        let decl = declaration("app::memoized", "f");
        let first = resolve(&decl, &global).unwrap();
        let second = resolve(&decl, &global).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_auto_name_strips_hidden_prefix() {
        let decl = declaration("my_app::services::user", "find_user");
        let hidden = vec!["my_app::".to_string()];
        assert_eq!(
            auto_derive_name(&decl, &hidden),
            "services::user::find_user"
        );
        // longest matching prefix wins
        let hidden = vec!["my_app::".to_string(), "my_app::services::".to_string()];
        assert_eq!(auto_derive_name(&decl, &hidden), "user::find_user");
        // no prefix configured: full path
        assert_eq!(
            auto_derive_name(&decl, &[]),
            "my_app::services::user::find_user"
        );
    }

    #[test]
    fn test_auto_name_collision_is_config_error() {
        let global = GlobalConfig::builder()
            .hidden_package("hidden::")
            .build();
        // stripping "hidden::" makes these two distinct functions collide
        let first = declaration("collision_test::api", "fetch");
        let second = declaration("hidden::collision_test::api", "fetch");
        let resolved_first = resolve(&first, &global).unwrap();
        claim_name(&first, &resolved_first).unwrap();
        let resolved_second = resolve(&second, &global).unwrap();
        let err = claim_name(&second, &resolved_second).unwrap_err();
        assert!(matches!(err, ConfigError::NameCollision { .. }));
    }

    #[test]
    fn test_explicit_shared_name_is_allowed() {
        let global = GlobalConfig::builder().build();
        let mut first = declaration("share_test::a", "f");
        first.name = Some("shared-codes");
        let mut second = declaration("share_test::b", "g");
        second.name = Some("shared-codes");
        let resolved_first = resolve(&first, &global).unwrap();
        claim_name(&first, &resolved_first).unwrap();
        let resolved_second = resolve(&second, &global).unwrap();
        assert!(claim_name(&second, &resolved_second).is_ok());
    }

    #[test]
    fn test_same_name_distinct_location_resolves_separately() {
        // two same-named inherent methods in one module differ only by
        // source location; each must get its own resolution entry
        let global = GlobalConfig::builder().build();
        let mut first = declaration("location_test", "label");
        first.line = 10;
        first.expire = Some(60);
        let mut second = declaration("location_test", "label");
        second.line = 20;

        let resolved_first = resolve(&first, &global).unwrap();
        let resolved_second = resolve(&second, &global).unwrap();
        assert!(!Arc::ptr_eq(&resolved_first, &resolved_second));
        assert_eq!(resolved_first.expire, Some(Duration::from_secs(60)));
        assert_eq!(resolved_second.expire, None);
    }

    #[test]
    fn test_unknown_policy_surfaces_at_resolution() {
        let global = GlobalConfig::builder().build();
        let mut decl = declaration("app::badserial", "f");
        decl.serial_policy = Some("kryo");
        assert!(matches!(
            resolve_uncached(&decl, &global),
            Err(ConfigError::UnknownSerialPolicy(_))
        ));
    }

    #[test]
    fn test_missing_remote_store_surfaces_at_resolution() {
        let global = GlobalConfig::builder().build();
        let mut decl = declaration("app::nostore", "f");
        decl.cache_type = CacheType::Both;
        assert!(matches!(
            resolve_uncached(&decl, &global),
            Err(ConfigError::NoRemoteStore(_))
        ));

        let global = GlobalConfig::builder()
            .remote_store("default", std::sync::Arc::new(MemoryStore::new()))
            .build();
        assert!(resolve_uncached(&decl, &global).is_ok());
    }
}
