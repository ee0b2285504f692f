//! # Cachette
//!
//! Declarative method caching for Rust: annotate a function with
//! `#[cached(...)]` and its results are served from a local, remote, or
//! two-level cache. Per-site attributes merge with process-wide defaults,
//! sites sharing a name share one cache, and every cache-side failure fails
//! closed — the annotated function always behaves as if the cache were not
//! there.
//!
//! ## Features
//!
//! - **Declarative**: per-call-site configuration in the attribute, global
//!   defaults installed once via [`configure`]
//! - **Two-level caching**: a bounded in-process tier in front of a pluggable
//!   remote store, with read-repair
//! - **Expressions**: `condition`, `post_condition` and `key` evaluated
//!   against the call's arguments
//! - **Shared caches**: declarations with the same explicit `(area, name)`
//!   read, write and invalidate one cache
//! - **Fail-closed**: configuration mistakes disable a site, runtime failures
//!   bypass a call; the computation itself is never disturbed
//!
//! ## Quick Start
//!
//! Install a configuration once at startup, then annotate:
//!
//! ```rust
//! use cachette::{cached, configure, GlobalConfig};
//!
//! #[cached(name = "squares")]
//! fn square(x: u32) -> u64 {
//!     (x as u64) * (x as u64)
//! }
//!
//! configure(GlobalConfig::builder().default_expire(300).build());
//!
//! // First call computes, second call is served from cache
//! assert_eq!(square(4), 16);
//! assert_eq!(square(4), 16);
//! ```
//!
//! Without [`configure`], annotated functions simply run their bodies.
//!
//! ## Two-Level Caching
//!
//! With `cache_type = "both"` a local tier fronts the remote store
//! registered for the declaration's area:
//!
//! ```rust
//! use std::sync::Arc;
//! use cachette::{cached, configure, GlobalConfig, MemoryStore};
//!
//! #[cached(name = "user-cache", cache_type = "both", expire = 300, local_expire = 60)]
//! fn find_user(id: u64) -> Option<String> {
//!     Some(format!("user-{id}"))
//! }
//!
//! configure(
//!     GlobalConfig::builder()
//!         .remote_store("default", Arc::new(MemoryStore::new()))
//!         .build(),
//! );
//!
//! assert_eq!(find_user(7), Some("user-7".to_string()));
//! ```
//!
//! ## Conditions and Keys
//!
//! Expressions see the call's arguments by name:
//!
//! ```rust
//! use cachette::{cached, configure, GlobalConfig};
//!
//! // Only cache real lookups, and key on the id alone.
//! #[cached(name = "profile-cache", condition = "id > 0", key = "id")]
//! fn profile(id: i64, verbose: bool) -> String {
//!     format!("profile-{id}-{verbose}")
//! }
//!
//! configure(GlobalConfig::builder().build());
//!
//! assert_eq!(profile(1, true), "profile-1-true");
//! // same id, different flag: still a hit, the key ignores `verbose`
//! assert_eq!(profile(1, false), "profile-1-true");
//! ```
//!
//! ## Error Handling
//!
//! Functions returning `Result<T, E>` cache only their `Ok` payload; an
//! `Err` is returned verbatim and recomputed on the next call:
//!
//! ```rust
//! use cachette::{cached, configure, GlobalConfig};
//!
//! #[cached(name = "division-cache")]
//! fn divide(a: i32, b: i32) -> Result<i32, String> {
//!     if b == 0 {
//!         Err("division by zero".to_string())
//!     } else {
//!         Ok(a / b)
//!     }
//! }
//!
//! configure(GlobalConfig::builder().build());
//!
//! assert_eq!(divide(10, 2), Ok(5));
//! assert!(divide(10, 0).is_err());
//! ```
//!
//! ## Invalidation
//!
//! `#[cache_invalidate]` removes an entry after a successful mutation:
//!
//! ```rust
//! use cachette::{cache_invalidate, cached, configure, GlobalConfig};
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! static COMPUTED: AtomicU32 = AtomicU32::new(0);
//!
//! #[cached(name = "greeting-cache", key = "id")]
//! fn greeting(id: u32) -> String {
//!     COMPUTED.fetch_add(1, Ordering::SeqCst);
//!     format!("hello {id}")
//! }
//!
//! #[cache_invalidate(name = "greeting-cache", key = "id")]
//! fn rename(id: u32, name: String) -> Result<(), String> {
//!     let _ = name;
//!     Ok(())
//! }
//!
//! configure(GlobalConfig::builder().build());
//!
//! greeting(1);
//! greeting(1); // served from cache
//! assert_eq!(COMPUTED.load(Ordering::SeqCst), 1);
//!
//! rename(1, "other".to_string()).unwrap();
//! // the entry for id 1 was removed; the next call recomputes
//! greeting(1);
//! assert_eq!(COMPUTED.load(Ordering::SeqCst), 2);
//! ```
//!
//! ## Statistics
//!
//! With the `stats` feature (on by default), every cache registers
//! hit/miss/put counters under `"area/name"`:
//!
//! ```rust
//! use cachette::{cached, configure, stats_registry, GlobalConfig};
//!
//! #[cached(name = "stat-cache")]
//! fn lookup(id: u32) -> u32 {
//!     id * 2
//! }
//!
//! configure(GlobalConfig::builder().build());
//! lookup(1);
//! lookup(1);
//!
//! let stats = stats_registry::get("default/stat-cache").unwrap();
//! assert_eq!(stats.hits(), 1);
//! assert_eq!(stats.misses(), 1);
//! ```

pub use cachette_core::*;
pub use cachette_macros::{cache_invalidate, cached};
