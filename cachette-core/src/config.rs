use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::expr::{BuiltinEngine, ExpressionEngine};
use crate::remote::RemoteStore;
use crate::EvictionPolicy;

/// Area used when a declaration does not specify one.
pub const DEFAULT_AREA: &str = "default";

/// Local tier element-count bound used when neither the declaration nor the
/// global configuration specifies one.
pub const DEFAULT_LOCAL_LIMIT: usize = 100;

/// Serialization policy used when neither the declaration nor the global
/// configuration specifies one.
pub const DEFAULT_SERIAL_POLICY: &str = "json";

/// Key convertor used when neither the declaration nor the global
/// configuration specifies one.
pub const DEFAULT_KEY_CONVERTOR: &str = "json";

/// Tier composition of a cache instance.
///
/// `Both` composes a two-level cache: a fast in-process tier in front of an
/// authoritative remote tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheType {
    Local,
    Remote,
    Both,
}

impl CacheType {
    pub fn needs_local(&self) -> bool {
        matches!(self, CacheType::Local | CacheType::Both)
    }

    pub fn needs_remote(&self) -> bool {
        matches!(self, CacheType::Remote | CacheType::Both)
    }
}

/// Identity of a declared cache site: the declaring module path and
/// function name plus the source location, supplied by the interception
/// side as plain data.
///
/// The source location matters: two same-named inherent methods in
/// different `impl` blocks of one module share a module path and function
/// name, yet are distinct sites and must never share resolution state.
///
/// Resolution results are memoized per `DeclarationId`, so the cost of
/// merging a declaration with the global defaults is paid once per site,
/// not once per call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeclarationId {
    pub module_path: &'static str,
    pub function: &'static str,
    pub file: &'static str,
    pub line: u32,
}

impl fmt::Display for DeclarationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{} ({}:{})",
            self.module_path, self.function, self.file, self.line
        )
    }
}

/// Static cache declaration attached to one call site.
///
/// Built by the `#[cached(...)]` attribute macro (or by hand for manual
/// interceptors) and immutable once constructed. `None` means "unset, use
/// the global default" and is distinct from an explicit zero/empty value.
#[derive(Clone, Debug)]
pub struct CacheDeclaration {
    /// Cache area (namespace). Independent areas can be backed by different
    /// remote stores.
    pub area: &'static str,
    /// Logical cache name. `None` auto-derives one from the declaring module
    /// path and function name. Two declarations sharing `(area, name)`
    /// resolve to the same cache instance.
    pub name: Option<&'static str>,
    /// Whether this site caches at all. `None` falls back to the global
    /// default, then `true`.
    pub enabled: Option<bool>,
    /// Entry TTL in seconds. `None` falls back to the global default, then
    /// to no expiration.
    pub expire: Option<u64>,
    /// Local tier TTL override in seconds when `cache_type` is `Both`.
    /// Inherits `expire` when unset.
    pub local_expire: Option<u64>,
    pub cache_type: CacheType,
    /// Local tier element-count bound.
    pub local_limit: Option<usize>,
    /// Serialization policy name for the remote tier.
    pub serial_policy: Option<&'static str>,
    /// Key convertor name for structural key derivation.
    pub key_convertor: Option<&'static str>,
    /// Key expression. `None` derives a structural key from the full ordered
    /// argument list.
    pub key: Option<&'static str>,
    /// Whether a null result (`None`) is cached. `None` falls back to the
    /// global default, then `false`.
    pub cache_null_value: Option<bool>,
    /// Condition expression evaluated before the cache is consulted.
    pub condition: Option<&'static str>,
    /// Post-condition expression evaluated against the fresh result; `false`
    /// vetoes the cache write.
    pub post_condition: Option<&'static str>,
    pub module_path: &'static str,
    pub function: &'static str,
    pub file: &'static str,
    pub line: u32,
}

impl CacheDeclaration {
    pub const fn id(&self) -> DeclarationId {
        DeclarationId {
            module_path: self.module_path,
            function: self.function,
            file: self.file,
            line: self.line,
        }
    }
}

/// Process-wide caching defaults, installed once via [`configure`].
///
/// Every optional declaration attribute falls back to the value here; the
/// engine tolerates the configuration being absent entirely, in which case
/// every call bypasses caching.
pub struct GlobalConfig {
    enable_method_cache: bool,
    hidden_packages: Vec<String>,
    default_expire: Option<u64>,
    default_local_limit: usize,
    default_serial_policy: String,
    default_key_convertor: String,
    default_cache_null_value: bool,
    default_enabled: bool,
    local_eviction_policy: EvictionPolicy,
    remote_stores: HashMap<String, Arc<dyn RemoteStore>>,
    expression_engine: Arc<dyn ExpressionEngine>,
}

impl GlobalConfig {
    pub fn builder() -> GlobalConfigBuilder {
        GlobalConfigBuilder::new()
    }

    /// Master switch. When false, every annotated call runs uncached.
    pub fn enable_method_cache(&self) -> bool {
        self.enable_method_cache
    }

    /// Module-path prefixes stripped while auto-deriving cache names, so the
    /// derived name stays stable across refactors that only move packages.
    pub fn hidden_packages(&self) -> &[String] {
        &self.hidden_packages
    }

    pub fn default_expire(&self) -> Option<u64> {
        self.default_expire
    }

    pub fn default_local_limit(&self) -> usize {
        self.default_local_limit
    }

    pub fn default_serial_policy(&self) -> &str {
        &self.default_serial_policy
    }

    pub fn default_key_convertor(&self) -> &str {
        &self.default_key_convertor
    }

    pub fn default_cache_null_value(&self) -> bool {
        self.default_cache_null_value
    }

    pub fn default_enabled(&self) -> bool {
        self.default_enabled
    }

    pub fn local_eviction_policy(&self) -> EvictionPolicy {
        self.local_eviction_policy
    }

    /// The remote store registered for an area, if any.
    pub fn remote_store(&self, area: &str) -> Option<Arc<dyn RemoteStore>> {
        self.remote_stores.get(area).cloned()
    }

    pub fn expression_engine(&self) -> &Arc<dyn ExpressionEngine> {
        &self.expression_engine
    }
}

/// Builder for [`GlobalConfig`].
///
/// # Examples
///
/// ```
/// use cachette_core::{GlobalConfig, EvictionPolicy};
///
/// let config = GlobalConfig::builder()
///     .default_expire(300)
///     .default_local_limit(500)
///     .local_eviction_policy(EvictionPolicy::LRU)
///     .hidden_package("my_app::")
///     .build();
///
/// assert_eq!(config.default_expire(), Some(300));
/// ```
pub struct GlobalConfigBuilder {
    enable_method_cache: bool,
    hidden_packages: Vec<String>,
    default_expire: Option<u64>,
    default_local_limit: usize,
    default_serial_policy: String,
    default_key_convertor: String,
    default_cache_null_value: bool,
    default_enabled: bool,
    local_eviction_policy: EvictionPolicy,
    remote_stores: HashMap<String, Arc<dyn RemoteStore>>,
    expression_engine: Arc<dyn ExpressionEngine>,
}

impl GlobalConfigBuilder {
    fn new() -> Self {
        Self {
            enable_method_cache: true,
            hidden_packages: Vec::new(),
            default_expire: None,
            default_local_limit: DEFAULT_LOCAL_LIMIT,
            default_serial_policy: DEFAULT_SERIAL_POLICY.to_string(),
            default_key_convertor: DEFAULT_KEY_CONVERTOR.to_string(),
            default_cache_null_value: false,
            default_enabled: true,
            local_eviction_policy: EvictionPolicy::default(),
            remote_stores: HashMap::new(),
            expression_engine: Arc::new(BuiltinEngine),
        }
    }

    pub fn enable_method_cache(mut self, enabled: bool) -> Self {
        self.enable_method_cache = enabled;
        self
    }

    pub fn hidden_package(mut self, prefix: impl Into<String>) -> Self {
        self.hidden_packages.push(prefix.into());
        self
    }

    /// Default entry TTL in seconds for declarations that do not set one.
    pub fn default_expire(mut self, seconds: u64) -> Self {
        self.default_expire = Some(seconds);
        self
    }

    pub fn default_local_limit(mut self, limit: usize) -> Self {
        self.default_local_limit = limit;
        self
    }

    pub fn default_serial_policy(mut self, name: impl Into<String>) -> Self {
        self.default_serial_policy = name.into();
        self
    }

    pub fn default_key_convertor(mut self, name: impl Into<String>) -> Self {
        self.default_key_convertor = name.into();
        self
    }

    pub fn default_cache_null_value(mut self, cache_null: bool) -> Self {
        self.default_cache_null_value = cache_null;
        self
    }

    pub fn default_enabled(mut self, enabled: bool) -> Self {
        self.default_enabled = enabled;
        self
    }

    pub fn local_eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.local_eviction_policy = policy;
        self
    }

    /// Registers the remote store backing an area. Required for declarations
    /// with `cache_type` `Remote` or `Both` in that area.
    pub fn remote_store(mut self, area: impl Into<String>, store: Arc<dyn RemoteStore>) -> Self {
        self.remote_stores.insert(area.into(), store);
        self
    }

    /// Replaces the built-in expression engine.
    pub fn expression_engine(mut self, engine: Arc<dyn ExpressionEngine>) -> Self {
        self.expression_engine = engine;
        self
    }

    pub fn build(self) -> GlobalConfig {
        GlobalConfig {
            enable_method_cache: self.enable_method_cache,
            hidden_packages: self.hidden_packages,
            default_expire: self.default_expire,
            default_local_limit: self.default_local_limit,
            default_serial_policy: self.default_serial_policy,
            default_key_convertor: self.default_key_convertor,
            default_cache_null_value: self.default_cache_null_value,
            default_enabled: self.default_enabled,
            local_eviction_policy: self.local_eviction_policy,
            remote_stores: self.remote_stores,
            expression_engine: self.expression_engine,
        }
    }
}

static GLOBAL_CONFIG: OnceCell<GlobalConfig> = OnceCell::new();

/// Installs the process-wide configuration.
///
/// Write-once: the first caller wins and `true` is returned; later callers
/// observe the winner and get `false`. Safe to race from multiple threads.
pub fn configure(config: GlobalConfig) -> bool {
    GLOBAL_CONFIG.set(config).is_ok()
}

/// The installed configuration, if any. `None` means caching is inactive.
pub fn global_config() -> Option<&'static GlobalConfig> {
    GLOBAL_CONFIG.get()
}
