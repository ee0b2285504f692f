//! # Cachette Core
//!
//! The engine behind the `cachette` attribute macros: declarative,
//! per-call-site cache configuration with global defaults, shared cache
//! instances and two-level (local + remote) storage.
//!
//! ## Features
//!
//! - **Declarative configuration**: a static [`CacheDeclaration`] per call
//!   site, merged with the process-wide [`GlobalConfig`] on first use
//! - **Shared instances**: declarations resolving to the same `(area, name)`
//!   operate on one [`CacheInstance`]
//! - **Two-level caching**: an in-process tier in front of a pluggable
//!   [`RemoteStore`], with read-repair
//! - **Expressions**: `condition`, `post_condition` and `key` evaluated by a
//!   built-in, swappable expression engine
//! - **Fail-closed**: any configuration or runtime failure disables caching
//!   for the affected site or call, never the computation itself
//! - **Statistics**: per-instance hit/miss counters behind the `stats`
//!   feature
//!
//! ## Module Organization
//!
//! - [`engine`] - the invocation pipeline driven by the attribute macros
//! - `config` - declarations, global configuration, [`configure`]
//! - `resolver` - declaration + defaults merge, memoized per site
//! - [`registry`] - the `(area, name)` instance registry
//! - `expr` - the built-in expression language
//! - [`key`] - structural and expression-based key derivation
//! - `local_cache` / `remote` - the two storage tiers
//! - `serial` - remote-tier serialization policies

mod cache_entry;
mod config;
mod error;
mod eviction_policy;
mod expr;
mod instance;
mod local_cache;
mod remote;
mod resolver;
mod serial;

pub mod engine;
pub mod key;
pub mod registry;

#[cfg(feature = "stats")]
mod stats;

#[cfg(feature = "stats")]
pub mod stats_registry;

pub use cache_entry::CacheEntry;
pub use config::{
    configure, global_config, CacheDeclaration, CacheType, DeclarationId, GlobalConfig,
    GlobalConfigBuilder, DEFAULT_AREA, DEFAULT_KEY_CONVERTOR, DEFAULT_LOCAL_LIMIT,
    DEFAULT_SERIAL_POLICY,
};
pub use engine::{
    caching_active, invalidate, invoke, invoke_fallible, CacheSite, CapturedArgs,
    InvalidateDeclaration, InvalidateSite,
};
pub use error::{ConfigError, ExprError, KeyError, TierError};
pub use eviction_policy::EvictionPolicy;
pub use expr::{Bindings, BuiltinEngine, CompiledExpression, ExpressionEngine};
pub use instance::{CacheInstance, Cacheable};
pub use key::{KeyConvertor, EMPTY_ARGS_KEY};
pub use local_cache::{LocalCache, StoredValue};
pub use remote::{MemoryStore, RemoteCache, RemoteStore};
pub use resolver::ResolvedConfig;
pub use serial::SerialPolicy;

#[cfg(feature = "stats")]
pub use stats::CacheStats;
