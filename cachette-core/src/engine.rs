//! The invocation engine: everything that happens between an annotated call
//! and the wrapped function body.
//!
//! Each annotated function carries one static [`CacheSite`]. On the first
//! call through a site, its declaration is resolved against the global
//! configuration, its expressions are compiled and its cache instance is
//! created; the outcome (success or configuration error) is latched for the
//! process lifetime. Configuration errors disable the site: every call runs
//! the real computation, uncached, with a single warning at latch time.
//!
//! Per call, the pipeline is: condition check, key derivation, cache read,
//! invocation on a miss, post-condition check, cache write. Every runtime
//! failure along the way fails closed — the call bypasses caching (or skips
//! the write) and the computation's own result is returned untouched.

use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{global_config, CacheDeclaration, GlobalConfig};
use crate::error::{ConfigError, KeyError};
use crate::expr::{Bindings, CompiledExpression};
use crate::instance::{CacheInstance, Cacheable};
use crate::key::{self, KeyConvertor};
use crate::registry;
use crate::resolver::{self, ResolvedConfig};

/// Per-site state: the declaration as written, plus the lazily-latched
/// resolution outcome.
///
/// Declared `static` by the `#[cached]` macro, one per annotated function.
pub struct CacheSite {
    declaration: CacheDeclaration,
    runtime: OnceCell<Result<SiteRuntime, ConfigError>>,
}

struct SiteRuntime {
    resolved: Arc<ResolvedConfig>,
    instance: Arc<CacheInstance>,
    condition: Option<Box<dyn CompiledExpression>>,
    post_condition: Option<Box<dyn CompiledExpression>>,
    key_expr: Option<Box<dyn CompiledExpression>>,
}

impl CacheSite {
    pub const fn new(declaration: CacheDeclaration) -> Self {
        Self {
            declaration,
            runtime: OnceCell::new(),
        }
    }

    pub fn declaration(&self) -> &CacheDeclaration {
        &self.declaration
    }

    /// The latched runtime, resolving on first use. `None` when the site is
    /// disabled (resolution failed or the declaration is disabled).
    fn runtime(&self, global: &'static GlobalConfig) -> Option<&SiteRuntime> {
        let outcome = self
            .runtime
            .get_or_init(|| match SiteRuntime::build(&self.declaration, global) {
                Ok(runtime) => Ok(runtime),
                Err(err) => {
                    warn!(
                        site = %self.declaration.id(),
                        error = %err,
                        "cache declaration is invalid; caching disabled for this site"
                    );
                    Err(err)
                }
            });
        match outcome {
            Ok(runtime) if runtime.resolved.enabled => Some(runtime),
            _ => None,
        }
    }
}

impl SiteRuntime {
    fn build(
        declaration: &CacheDeclaration,
        global: &GlobalConfig,
    ) -> Result<Self, ConfigError> {
        let resolved = resolver::resolve(declaration, global)?;
        let engine = global.expression_engine();
        let compile = |attribute: &'static str,
                       source: &Option<String>|
         -> Result<Option<Box<dyn CompiledExpression>>, ConfigError> {
            match source {
                Some(source) => engine
                    .compile(source)
                    .map(Some)
                    .map_err(|source| ConfigError::Expression { attribute, source }),
                None => Ok(None),
            }
        };
        let condition = compile("condition", &resolved.condition)?;
        let post_condition = compile("post_condition", &resolved.post_condition)?;
        let key_expr = compile("key", &resolved.key)?;
        // Claim the (area, name) pair only once the site is known to be
        // viable; a site that fails above never blocks a later one.
        resolver::claim_name(declaration, &resolved)?;
        let instance = registry::get_or_create(&resolved, global)?;
        Ok(Self {
            resolved,
            instance,
            condition,
            post_condition,
            key_expr,
        })
    }
}

/// Whether a call through this site should bother capturing arguments at
/// all. False when no configuration is installed, the master switch is off,
/// the site failed to resolve or the declaration is disabled.
pub fn caching_active(site: &'static CacheSite) -> bool {
    match global_config() {
        Some(global) if global.enable_method_cache() => site.runtime(global).is_some(),
        _ => false,
    }
}

/// Arguments of one invocation, captured into structural values.
///
/// Built by the `#[cached]` macro in declaration order; a capture failure is
/// remembered and surfaces as a per-call bypass rather than a panic.
#[derive(Default)]
pub struct CapturedArgs {
    values: Vec<(&'static str, Value)>,
    failure: Option<KeyError>,
}

impl CapturedArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg<T: Serialize>(mut self, name: &'static str, value: &T) -> Self {
        if self.failure.is_some() {
            return self;
        }
        match serde_json::to_value(value) {
            Ok(value) => self.values.push((name, value)),
            Err(err) => {
                self.failure = Some(KeyError::Capture {
                    name,
                    message: err.to_string(),
                })
            }
        }
        self
    }

    fn into_values(self) -> Result<Vec<(&'static str, Value)>, KeyError> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.values),
        }
    }
}

struct PreparedCall<'a> {
    runtime: &'a SiteRuntime,
    args: Vec<(&'static str, Value)>,
    key: String,
}

/// Runs the pre-invocation half of the pipeline. `None` means this call
/// bypasses caching entirely.
fn prepare(site: &'static CacheSite, args: CapturedArgs) -> Option<PreparedCall<'static>> {
    let global = global_config()?;
    if !global.enable_method_cache() {
        return None;
    }
    let runtime = site.runtime(global)?;

    let args = match args.into_values() {
        Ok(args) => args,
        Err(err) => {
            warn!(
                site = %site.declaration.id(),
                error = %err,
                "argument capture failed; call runs uncached"
            );
            return None;
        }
    };

    if let Some(condition) = &runtime.condition {
        let bindings = Bindings::new(&args);
        match condition.evaluate_bool(&bindings) {
            Ok(true) => {}
            Ok(false) => {
                debug!(site = %site.declaration.id(), "condition is false; call runs uncached");
                return None;
            }
            Err(err) => {
                warn!(
                    site = %site.declaration.id(),
                    error = %err,
                    "condition failed; call runs uncached"
                );
                return None;
            }
        }
    }

    let key = match derive_key(runtime, &args) {
        Ok(key) => key,
        Err(err) => {
            warn!(
                site = %site.declaration.id(),
                error = %err,
                "key derivation failed; call runs uncached"
            );
            return None;
        }
    };

    Some(PreparedCall { runtime, args, key })
}

fn derive_key(runtime: &SiteRuntime, args: &[(&'static str, Value)]) -> Result<String, KeyError> {
    match &runtime.key_expr {
        Some(expr) => {
            let bindings = Bindings::new(args);
            let value = expr.evaluate(&bindings)?;
            Ok(key::expression_key(&value))
        }
        None => key::structural_key(args, runtime.resolved.key_convertor),
    }
}

/// Runs the post-invocation half: post-condition, null policy, write.
fn finish_write<R, N>(call: &PreparedCall<'_>, value: &R, is_null: N)
where
    R: Cacheable,
    N: Fn(&R) -> bool,
{
    if let Some(post_condition) = &call.runtime.post_condition {
        let result_value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    cache = %call.runtime.resolved.name,
                    error = %err,
                    "result capture for post-condition failed; write skipped"
                );
                return;
            }
        };
        let bindings = Bindings::new(&call.args).with_result(&result_value);
        match post_condition.evaluate_bool(&bindings) {
            Ok(true) => {}
            Ok(false) => {
                debug!(cache = %call.runtime.resolved.name, "post-condition vetoed the write");
                return;
            }
            Err(err) => {
                warn!(
                    cache = %call.runtime.resolved.name,
                    error = %err,
                    "post-condition failed; write skipped"
                );
                return;
            }
        }
    }

    if is_null(value) && !call.runtime.resolved.cache_null_value {
        return;
    }

    call.runtime.instance.put(&call.key, value);
}

/// Full pipeline for an infallible computation.
///
/// The `is_null` probe reports whether a fresh result counts as null for the
/// `cache_null_value` policy; the macro supplies `Option::is_none` for
/// `Option` returns and a constant-false probe otherwise.
pub fn invoke<R, N, F>(
    site: &'static CacheSite,
    args: CapturedArgs,
    is_null: N,
    compute: F,
) -> R
where
    R: Cacheable,
    N: Fn(&R) -> bool,
    F: FnOnce() -> R,
{
    let call = match prepare(site, args) {
        Some(call) => call,
        None => return compute(),
    };
    if let Some(hit) = call.runtime.instance.get::<R>(&call.key) {
        return hit;
    }
    let value = compute();
    finish_write(&call, &value, is_null);
    value
}

/// Full pipeline for a fallible computation.
///
/// Only the `Ok` payload is cached. An `Err` is returned verbatim: it is
/// never written to any tier and the post-condition is not evaluated.
pub fn invoke_fallible<T, E, N, F>(
    site: &'static CacheSite,
    args: CapturedArgs,
    is_null: N,
    compute: F,
) -> Result<T, E>
where
    T: Cacheable,
    N: Fn(&T) -> bool,
    F: FnOnce() -> Result<T, E>,
{
    let call = match prepare(site, args) {
        Some(call) => call,
        None => return compute(),
    };
    if let Some(hit) = call.runtime.instance.get::<T>(&call.key) {
        return Ok(hit);
    }
    let value = compute()?;
    finish_write(&call, &value, is_null);
    Ok(value)
}

/// Static declaration attached to a `#[cache_invalidate]` site.
///
/// Unlike [`CacheDeclaration`] the name is mandatory: an invalidation site
/// must target an explicitly named cache, there is nothing sensible to
/// auto-derive.
pub struct InvalidateDeclaration {
    pub area: &'static str,
    pub name: &'static str,
    /// Key expression; `None` derives the structural key from the captured
    /// arguments, so invalidation and caching sites with matching parameter
    /// lists agree on the key.
    pub key: Option<&'static str>,
    /// Condition gating the invalidation, evaluated against the arguments.
    pub condition: Option<&'static str>,
    pub module_path: &'static str,
    pub function: &'static str,
}

/// Per-site state for an invalidation site, mirroring [`CacheSite`].
pub struct InvalidateSite {
    declaration: InvalidateDeclaration,
    runtime: OnceCell<Result<InvalidateRuntime, ConfigError>>,
}

struct InvalidateRuntime {
    key_convertor: KeyConvertor,
    key_expr: Option<Box<dyn CompiledExpression>>,
    condition: Option<Box<dyn CompiledExpression>>,
}

impl InvalidateSite {
    pub const fn new(declaration: InvalidateDeclaration) -> Self {
        Self {
            declaration,
            runtime: OnceCell::new(),
        }
    }

    fn runtime(&self, global: &GlobalConfig) -> Option<&InvalidateRuntime> {
        self.runtime
            .get_or_init(|| match InvalidateRuntime::build(&self.declaration, global) {
                Ok(runtime) => Ok(runtime),
                Err(err) => {
                    warn!(
                        site = %format!("{}::{}", self.declaration.module_path, self.declaration.function),
                        error = %err,
                        "invalidation declaration is invalid; invalidation disabled for this site"
                    );
                    Err(err)
                }
            })
            .as_ref()
            .ok()
    }
}

impl InvalidateRuntime {
    fn build(
        declaration: &InvalidateDeclaration,
        global: &GlobalConfig,
    ) -> Result<Self, ConfigError> {
        let key_convertor = KeyConvertor::from_name(global.default_key_convertor())?;
        let engine = global.expression_engine();
        let compile = |attribute: &'static str,
                       source: Option<&'static str>|
         -> Result<Option<Box<dyn CompiledExpression>>, ConfigError> {
            match source {
                Some(source) => engine
                    .compile(source)
                    .map(Some)
                    .map_err(|source| ConfigError::Expression { attribute, source }),
                None => Ok(None),
            }
        };
        Ok(Self {
            key_convertor,
            key_expr: compile("key", declaration.key)?,
            condition: compile("condition", declaration.condition)?,
        })
    }
}

/// Removes the derived key from the targeted cache after a successful call.
///
/// `success` is false when the wrapped function returned an `Err`; the cache
/// is then left untouched. A cache that has never been populated (no
/// instance exists yet) is silently a no-op, as is any removal failure.
pub fn invalidate(site: &'static InvalidateSite, args: CapturedArgs, success: bool) {
    if !success {
        return;
    }
    let Some(global) = global_config() else {
        return;
    };
    if !global.enable_method_cache() {
        return;
    }
    let Some(runtime) = site.runtime(global) else {
        return;
    };

    let args = match args.into_values() {
        Ok(args) => args,
        Err(err) => {
            warn!(
                cache = %format!("{}/{}", site.declaration.area, site.declaration.name),
                error = %err,
                "argument capture failed; invalidation skipped"
            );
            return;
        }
    };

    if let Some(condition) = &runtime.condition {
        match condition.evaluate_bool(&Bindings::new(&args)) {
            Ok(true) => {}
            Ok(false) => return,
            Err(err) => {
                warn!(
                    cache = %format!("{}/{}", site.declaration.area, site.declaration.name),
                    error = %err,
                    "invalidation condition failed; invalidation skipped"
                );
                return;
            }
        }
    }

    let key = match &runtime.key_expr {
        Some(expr) => match expr.evaluate(&Bindings::new(&args)) {
            Ok(value) => key::expression_key(&value),
            Err(err) => {
                warn!(
                    cache = %format!("{}/{}", site.declaration.area, site.declaration.name),
                    error = %err,
                    "invalidation key derivation failed; invalidation skipped"
                );
                return;
            }
        },
        None => match key::structural_key(&args, runtime.key_convertor) {
            Ok(key) => key,
            Err(err) => {
                warn!(
                    cache = %format!("{}/{}", site.declaration.area, site.declaration.name),
                    error = %err,
                    "invalidation key derivation failed; invalidation skipped"
                );
                return;
            }
        },
    };

    if let Some(instance) = registry::lookup(site.declaration.area, site.declaration.name) {
        instance.remove(&key);
    }
}
