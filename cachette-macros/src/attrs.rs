//! Attribute parsing for `#[cached(...)]` and `#[cache_invalidate(...)]`.
//!
//! Attributes arrive as `key = value` pairs. Every parsed value is rendered
//! into tokens for a `CacheDeclaration` field, with `None` standing in for
//! attributes the user left unset so the runtime can tell "not configured"
//! apart from an explicit zero or empty value.

use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::{Expr, Lit, MetaNameValue, Token};

pub type AttributeArgs = Punctuated<MetaNameValue, Token![,]>;

/// Parsed `#[cached(...)]` attributes, rendered as declaration field tokens.
pub struct CachedAttributes {
    pub area: TokenStream2,
    pub name: TokenStream2,
    pub enabled: TokenStream2,
    pub expire: TokenStream2,
    pub local_expire: TokenStream2,
    pub cache_type: TokenStream2,
    pub local_limit: TokenStream2,
    pub serial_policy: TokenStream2,
    pub key_convertor: TokenStream2,
    pub key: TokenStream2,
    pub cache_null_value: TokenStream2,
    pub condition: TokenStream2,
    pub post_condition: TokenStream2,
    /// Parameter names excluded from argument capture.
    pub skip: Vec<String>,
}

impl Default for CachedAttributes {
    fn default() -> Self {
        Self {
            area: quote! { "default" },
            name: quote! { ::core::option::Option::None },
            enabled: quote! { ::core::option::Option::None },
            expire: quote! { ::core::option::Option::None },
            local_expire: quote! { ::core::option::Option::None },
            cache_type: quote! { ::cachette_core::CacheType::Local },
            local_limit: quote! { ::core::option::Option::None },
            serial_policy: quote! { ::core::option::Option::None },
            key_convertor: quote! { ::core::option::Option::None },
            key: quote! { ::core::option::Option::None },
            cache_null_value: quote! { ::core::option::Option::None },
            condition: quote! { ::core::option::Option::None },
            post_condition: quote! { ::core::option::Option::None },
            skip: Vec::new(),
        }
    }
}

pub fn parse_cached_attributes(args: AttributeArgs) -> syn::Result<CachedAttributes> {
    let mut attrs = CachedAttributes::default();
    for nv in &args {
        let key = path_name(nv)?;
        match key.as_str() {
            "area" => {
                let value = expect_str(nv)?;
                attrs.area = quote! { #value };
            }
            "name" => attrs.name = some_str(expect_str(nv)?),
            "enabled" => attrs.enabled = some_bool(expect_bool(nv)?),
            "expire" => attrs.expire = some_u64(expect_u64(nv)?),
            "local_expire" => attrs.local_expire = some_u64(expect_u64(nv)?),
            "cache_type" => {
                attrs.cache_type = match expect_str(nv)?.as_str() {
                    "local" => quote! { ::cachette_core::CacheType::Local },
                    "remote" => quote! { ::cachette_core::CacheType::Remote },
                    "both" => quote! { ::cachette_core::CacheType::Both },
                    other => {
                        return Err(syn::Error::new_spanned(
                            &nv.value,
                            format!(
                                "invalid cache_type `{other}`: expected \"local\", \"remote\" or \"both\""
                            ),
                        ))
                    }
                };
            }
            "local_limit" => {
                let value = expect_u64(nv)? as usize;
                attrs.local_limit = quote! { ::core::option::Option::Some(#value) };
            }
            "serial_policy" => attrs.serial_policy = some_str(expect_str(nv)?),
            "key_convertor" => attrs.key_convertor = some_str(expect_str(nv)?),
            "key" => attrs.key = some_str(expect_str(nv)?),
            "cache_null_value" => attrs.cache_null_value = some_bool(expect_bool(nv)?),
            "condition" => attrs.condition = some_str(expect_str(nv)?),
            "post_condition" => attrs.post_condition = some_str(expect_str(nv)?),
            "skip" => attrs.skip = parse_skip_list(&expect_str(nv)?),
            other => {
                return Err(syn::Error::new_spanned(
                    &nv.path,
                    format!("unknown attribute `{other}`"),
                ))
            }
        }
    }
    Ok(attrs)
}

/// Parsed `#[cache_invalidate(...)]` attributes. `name` is mandatory: an
/// invalidation site must target an explicitly named cache.
pub struct InvalidateAttributes {
    pub area: TokenStream2,
    pub name: String,
    pub key: TokenStream2,
    pub condition: TokenStream2,
    pub skip: Vec<String>,
}

pub fn parse_invalidate_attributes(args: AttributeArgs) -> syn::Result<InvalidateAttributes> {
    let mut area = quote! { "default" };
    let mut name = None;
    let mut key = quote! { ::core::option::Option::None };
    let mut condition = quote! { ::core::option::Option::None };
    let mut skip = Vec::new();

    for nv in &args {
        let attr_key = path_name(nv)?;
        match attr_key.as_str() {
            "area" => {
                let value = expect_str(nv)?;
                area = quote! { #value };
            }
            "name" => name = Some(expect_str(nv)?),
            "key" => key = some_str(expect_str(nv)?),
            "condition" => condition = some_str(expect_str(nv)?),
            "skip" => skip = parse_skip_list(&expect_str(nv)?),
            other => {
                return Err(syn::Error::new_spanned(
                    &nv.path,
                    format!("unknown attribute `{other}`"),
                ))
            }
        }
    }

    match name {
        Some(name) => Ok(InvalidateAttributes {
            area,
            name,
            key,
            condition,
            skip,
        }),
        None => Err(syn::Error::new(
            proc_macro2::Span::call_site(),
            "cache_invalidate requires a `name` attribute",
        )),
    }
}

fn path_name(nv: &MetaNameValue) -> syn::Result<String> {
    nv.path
        .get_ident()
        .map(|ident| ident.to_string())
        .ok_or_else(|| syn::Error::new_spanned(&nv.path, "expected a plain attribute name"))
}

fn expect_str(nv: &MetaNameValue) -> syn::Result<String> {
    if let Expr::Lit(expr_lit) = &nv.value {
        if let Lit::Str(s) = &expr_lit.lit {
            return Ok(s.value());
        }
    }
    Err(syn::Error::new_spanned(
        &nv.value,
        "expected a string literal",
    ))
}

fn expect_u64(nv: &MetaNameValue) -> syn::Result<u64> {
    if let Expr::Lit(expr_lit) = &nv.value {
        if let Lit::Int(i) = &expr_lit.lit {
            return i.base10_parse();
        }
    }
    Err(syn::Error::new_spanned(
        &nv.value,
        "expected an integer literal",
    ))
}

fn expect_bool(nv: &MetaNameValue) -> syn::Result<bool> {
    if let Expr::Lit(expr_lit) = &nv.value {
        if let Lit::Bool(b) = &expr_lit.lit {
            return Ok(b.value());
        }
    }
    Err(syn::Error::new_spanned(
        &nv.value,
        "expected `true` or `false`",
    ))
}

fn some_str(value: String) -> TokenStream2 {
    quote! { ::core::option::Option::Some(#value) }
}

fn some_bool(value: bool) -> TokenStream2 {
    quote! { ::core::option::Option::Some(#value) }
}

fn some_u64(value: u64) -> TokenStream2 {
    quote! { ::core::option::Option::Some(#value) }
}

fn parse_skip_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
