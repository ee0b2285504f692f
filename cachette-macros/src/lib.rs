//! Procedural macros for the `cachette` caching library.
//!
//! `#[cached(...)]` wraps a function with the declarative caching pipeline
//! and `#[cache_invalidate(...)]` removes an entry after a successful call.
//! Both expand to a static declaration plus a call into `cachette_core`'s
//! invocation engine; all policy (resolution, expressions, tiers, failure
//! handling) lives in the engine, not in the generated code.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::{parse_macro_input, FnArg, ItemFn, Pat, ReturnType};

mod attrs;

use attrs::{parse_cached_attributes, parse_invalidate_attributes, AttributeArgs};

/// Shape of the wrapped function's return type, detected from its rendered
/// form. `Result` marks the computation fallible: an `Err` is returned
/// verbatim and never cached. An `Option` payload (plain or inside `Ok`)
/// gets a null probe so `cache_null_value` can apply.
#[derive(Clone, Copy)]
enum ReturnShape {
    Plain,
    Option,
    Result { inner_option: bool },
}

fn return_shape(output: &ReturnType) -> ReturnShape {
    let rendered = match output {
        ReturnType::Type(_, ty) => quote!(#ty).to_string().replace(' ', ""),
        ReturnType::Default => String::new(),
    };
    let rendered = normalize_path(&rendered);
    if let Some(inner) = rendered.strip_prefix("Result<") {
        let inner = normalize_path(inner);
        ReturnShape::Result {
            inner_option: inner.starts_with("Option<"),
        }
    } else if rendered.starts_with("Option<") {
        ReturnShape::Option
    } else {
        ReturnShape::Plain
    }
}

fn normalize_path(ty: &str) -> &str {
    let ty = ty.strip_prefix("::").unwrap_or(ty);
    let ty = ty.strip_prefix("std::").unwrap_or(ty);
    let ty = ty.strip_prefix("core::").unwrap_or(ty);
    let ty = ty.strip_prefix("result::").unwrap_or(ty);
    let ty = ty.strip_prefix("option::").unwrap_or(ty);
    ty
}

/// One `.arg("name", &name)` call per capturable parameter, in declaration
/// order. `self`, non-identifier patterns and skip-listed names are left
/// out of the capture (and therefore out of key derivation and expression
/// bindings).
fn capture_calls(input: &ItemFn, skip: &[String]) -> Vec<TokenStream2> {
    let mut calls = Vec::new();
    for arg in input.sig.inputs.iter() {
        if let FnArg::Typed(pat_type) = arg {
            if let Pat::Ident(pat_ident) = &*pat_type.pat {
                let ident = &pat_ident.ident;
                let name = ident.to_string();
                if skip.iter().any(|skipped| skipped == &name) {
                    continue;
                }
                calls.push(quote! { .arg(#name, &#ident) });
            }
        }
    }
    calls
}

/// Adds declarative caching to a function or method.
///
/// The annotated function keeps its exact signature. On each call the engine
/// checks the site's `condition`, derives a key from the captured arguments
/// (or the `key` expression), consults the cache and only runs the original
/// body on a miss; the fresh result is written back unless the
/// `post_condition` or the null policy vetoes it.
///
/// Caching is inert until [`cachette_core::configure`] installs a global
/// configuration; before that, every call runs the body directly.
///
/// # Macro Parameters
///
/// All parameters are optional; unset ones fall back to the global defaults.
///
/// - `area`: cache namespace, selects the remote store. Default `"default"`.
/// - `name`: logical cache name. Two sites sharing an explicit `(area, name)`
///   share one cache. Default: derived from the module path and function
///   name.
/// - `enabled`: set `false` to declare the site without activating it.
/// - `expire`: entry TTL in seconds. Default: global default, then none.
/// - `local_expire`: local-tier TTL override for two-level caches.
/// - `cache_type`: `"local"` (default), `"remote"` or `"both"`.
/// - `local_limit`: local tier entry bound.
/// - `serial_policy`: `"json"` or `"bincode"`, for the remote tier.
/// - `key_convertor`: `"json"` (structural) or `"none"` (single primitive
///   argument used verbatim).
/// - `key`: expression computing the key from the arguments, e.g.
///   `key = "id"`.
/// - `cache_null_value`: whether a `None` result is cached. Default `false`.
/// - `condition`: expression gating the whole pipeline, e.g.
///   `condition = "id > 0"`.
/// - `post_condition`: expression over `result` gating the write, e.g.
///   `post_condition = "!result.is_empty()"`.
/// - `skip`: comma-separated parameter names excluded from capture; skipped
///   parameters need not implement `Serialize`.
///
/// # Requirements
///
/// - Captured arguments must implement `serde::Serialize`.
/// - The return type (the `Ok` payload for `Result` returns) must implement
///   `Clone + Serialize + DeserializeOwned + Send + Sync + 'static`.
///
/// # Examples
///
/// ```ignore
/// use cachette::cached;
///
/// #[cached(name = "user-cache", expire = 300, cache_type = "both")]
/// fn find_user(id: u64) -> Option<User> {
///     load_from_database(id)
/// }
/// ```
///
/// Fallible functions cache only their `Ok` payload:
///
/// ```ignore
/// #[cached(name = "price-cache", expire = 60, condition = "sku != ''")]
/// fn price_of(sku: String) -> Result<Price, QuoteError> {
///     quote_service(&sku)
/// }
/// ```
///
/// Non-serializable handles stay out of the key via `skip`:
///
/// ```ignore
/// #[cached(name = "report-cache", skip = "conn")]
/// fn build_report(conn: &mut Connection, month: u8) -> Report {
///     query_report(conn, month)
/// }
/// ```
#[proc_macro_attribute]
pub fn cached(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr with AttributeArgs::parse_terminated);
    let attrs = match parse_cached_attributes(args) {
        Ok(attrs) => attrs,
        Err(err) => return err.to_compile_error().into(),
    };

    let input = parse_macro_input!(item as ItemFn);
    let vis = &input.vis;
    let sig = &input.sig;
    let block = &input.block;
    let fn_name = sig.ident.to_string();

    let capture = capture_calls(&input, &attrs.skip);
    let shape = return_shape(&sig.output);

    let null_probe = match shape {
        ReturnShape::Option | ReturnShape::Result { inner_option: true } => {
            quote! { |__v: &::core::option::Option<_>| __v.is_none() }
        }
        _ => quote! { |_| false },
    };

    let area = &attrs.area;
    let name = &attrs.name;
    let enabled = &attrs.enabled;
    let expire = &attrs.expire;
    let local_expire = &attrs.local_expire;
    let cache_type = &attrs.cache_type;
    let local_limit = &attrs.local_limit;
    let serial_policy = &attrs.serial_policy;
    let key_convertor = &attrs.key_convertor;
    let key = &attrs.key;
    let cache_null_value = &attrs.cache_null_value;
    let condition = &attrs.condition;
    let post_condition = &attrs.post_condition;

    let dispatch = match shape {
        ReturnShape::Result { .. } => quote! {
            ::cachette_core::invoke_fallible(&__CACHE_SITE, __args, #null_probe, || #block)
        },
        _ => quote! {
            ::cachette_core::invoke(&__CACHE_SITE, __args, #null_probe, || #block)
        },
    };

    let expanded = quote! {
        #vis #sig {
            static __CACHE_SITE: ::cachette_core::CacheSite =
                ::cachette_core::CacheSite::new(::cachette_core::CacheDeclaration {
                    area: #area,
                    name: #name,
                    enabled: #enabled,
                    expire: #expire,
                    local_expire: #local_expire,
                    cache_type: #cache_type,
                    local_limit: #local_limit,
                    serial_policy: #serial_policy,
                    key_convertor: #key_convertor,
                    key: #key,
                    cache_null_value: #cache_null_value,
                    condition: #condition,
                    post_condition: #post_condition,
                    module_path: ::core::module_path!(),
                    function: #fn_name,
                    file: ::core::file!(),
                    line: ::core::line!(),
                });

            if !::cachette_core::caching_active(&__CACHE_SITE) {
                return (|| #block)();
            }

            let __args = ::cachette_core::CapturedArgs::new()#(#capture)*;
            #dispatch
        }
    };

    TokenStream::from(expanded)
}

/// Removes a cache entry after the annotated function returns successfully.
///
/// The wrapped body always runs first. If it completes (for `Result`
/// returns: completes with `Ok`), the key derived from the captured
/// arguments (or the `key` expression) is removed from the named cache.
/// Removal failures are reported through `tracing`, never propagated.
///
/// # Macro Parameters
///
/// - `name` (required): the target cache. Invalidation never auto-derives a
///   name; it must point at a cache declared elsewhere.
/// - `area`: the target cache's area. Default `"default"`.
/// - `key`: expression computing the key, e.g. `key = "id"`. Without it the
///   structural key of the captured arguments is used, so caching and
///   invalidation sites with matching parameter lists agree on keys.
/// - `condition`: expression gating the invalidation.
/// - `skip`: comma-separated parameter names excluded from capture.
///
/// # Examples
///
/// ```ignore
/// use cachette::{cached, cache_invalidate};
///
/// #[cached(name = "user-cache", key = "id")]
/// fn find_user(id: u64) -> Option<User> {
///     load_from_database(id)
/// }
///
/// #[cache_invalidate(name = "user-cache", key = "id")]
/// fn update_user(id: u64, update: UserUpdate) -> Result<(), DbError> {
///     write_to_database(id, update)
/// }
/// ```
#[proc_macro_attribute]
pub fn cache_invalidate(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr with AttributeArgs::parse_terminated);
    let attrs = match parse_invalidate_attributes(args) {
        Ok(attrs) => attrs,
        Err(err) => return err.to_compile_error().into(),
    };

    let input = parse_macro_input!(item as ItemFn);
    let vis = &input.vis;
    let sig = &input.sig;
    let block = &input.block;
    let fn_name = sig.ident.to_string();

    let capture = capture_calls(&input, &attrs.skip);

    let area = &attrs.area;
    let name = &attrs.name;
    let key = &attrs.key;
    let condition = &attrs.condition;

    let success = match return_shape(&sig.output) {
        ReturnShape::Result { .. } => quote! { __result.is_ok() },
        _ => quote! { true },
    };

    let expanded = quote! {
        #vis #sig {
            static __INVALIDATE_SITE: ::cachette_core::InvalidateSite =
                ::cachette_core::InvalidateSite::new(::cachette_core::InvalidateDeclaration {
                    area: #area,
                    name: #name,
                    key: #key,
                    condition: #condition,
                    module_path: ::core::module_path!(),
                    function: #fn_name,
                });

            let __args = ::cachette_core::CapturedArgs::new()#(#capture)*;
            let __result = (|| #block)();
            ::cachette_core::invalidate(&__INVALIDATE_SITE, __args, #success);
            __result
        }
    };

    TokenStream::from(expanded)
}
