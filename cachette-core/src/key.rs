//! Cache key derivation.
//!
//! A call's key either comes from an explicit `key` expression or from a
//! structural conversion of the full ordered argument list. Determinism is
//! the load-bearing property here: structurally equal argument lists must
//! always produce the same key, which is why the structural form is a
//! canonical JSON rendering with recursively sorted object keys rather than
//! whatever order the serializer happens to emit.

use serde_json::Value;

use crate::error::{ConfigError, KeyError};

/// Fixed key used for zero-argument calls. Each declaration owns its cache
/// instance (or shares one deliberately via an explicit name), so a constant
/// sentinel cannot collide with a derived key, which always renders as JSON.
pub const EMPTY_ARGS_KEY: &str = "__EMPTY_ARGS__";

/// Structural key conversion policy, selected by name at resolution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyConvertor {
    /// Canonical JSON over the ordered argument list.
    Json,
    /// No conversion: the single argument must already be a string, number
    /// or bool.
    None,
}

impl KeyConvertor {
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name {
            "json" => Ok(KeyConvertor::Json),
            "none" => Ok(KeyConvertor::None),
            other => Err(ConfigError::UnknownKeyConvertor(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            KeyConvertor::Json => "json",
            KeyConvertor::None => "none",
        }
    }
}

/// Derives a structural key from the captured argument list.
pub fn structural_key(
    args: &[(&'static str, Value)],
    convertor: KeyConvertor,
) -> Result<String, KeyError> {
    if args.is_empty() {
        return Ok(EMPTY_ARGS_KEY.to_string());
    }
    match convertor {
        KeyConvertor::Json => {
            let list = Value::Array(args.iter().map(|(_, v)| v.clone()).collect());
            Ok(canonical_json(&list))
        }
        KeyConvertor::None => {
            if args.len() == 1 {
                if let Some(key) = primitive_key(&args[0].1) {
                    return Ok(key);
                }
            }
            Err(KeyError::NotPrimitive)
        }
    }
}

/// Turns the result of a `key` expression into a key string. Primitive
/// results are used verbatim; anything else is canonicalized.
pub fn expression_key(value: &Value) -> String {
    primitive_key(value).unwrap_or_else(|| canonical_json(value))
}

fn primitive_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Renders a value as canonical JSON: object keys sorted recursively, arrays
/// in order, no whitespace. Structurally equal values always render to the
/// same string.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_escaped(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_escaped(key, out);
                out.push(':');
                if let Some(value) = map.get(*key) {
                    write_canonical(value, out);
                }
            }
            out.push('}');
        }
    }
}

fn write_escaped(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorts_object_keys() {
        let a = json!({"b": 1, "a": {"z": true, "y": [1, 2]}});
        let b = json!({"a": {"y": [1, 2], "z": true}, "b": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(canonical_json(&a), r#"{"a":{"y":[1,2],"z":true},"b":1}"#);
    }

    #[test]
    fn test_canonical_json_escapes_strings() {
        let value = json!("line\nbreak \"quoted\"");
        assert_eq!(canonical_json(&value), r#""line\nbreak \"quoted\"""#);
    }

    #[test]
    fn test_structural_key_is_deterministic() {
        let args_a = [("user", json!({"name": "Alice", "id": 42})), ("n", json!(3))];
        let args_b = [("user", json!({"id": 42, "name": "Alice"})), ("n", json!(3))];
        let key_a = structural_key(&args_a, KeyConvertor::Json).unwrap();
        let key_b = structural_key(&args_b, KeyConvertor::Json).unwrap();
        assert_eq!(key_a, key_b);
    }

    #[test]
    fn test_structural_key_order_matters() {
        let args_a = [("a", json!(1)), ("b", json!(2))];
        let args_b = [("a", json!(2)), ("b", json!(1))];
        assert_ne!(
            structural_key(&args_a, KeyConvertor::Json).unwrap(),
            structural_key(&args_b, KeyConvertor::Json).unwrap()
        );
    }

    #[test]
    fn test_zero_args_sentinel() {
        assert_eq!(
            structural_key(&[], KeyConvertor::Json).unwrap(),
            EMPTY_ARGS_KEY
        );
        assert_eq!(
            structural_key(&[], KeyConvertor::None).unwrap(),
            EMPTY_ARGS_KEY
        );
    }

    #[test]
    fn test_none_convertor_requires_single_primitive() {
        let single = [("id", json!(42))];
        assert_eq!(structural_key(&single, KeyConvertor::None).unwrap(), "42");

        let stringy = [("code", json!("abc"))];
        assert_eq!(
            structural_key(&stringy, KeyConvertor::None).unwrap(),
            "abc"
        );

        let two = [("a", json!(1)), ("b", json!(2))];
        assert!(matches!(
            structural_key(&two, KeyConvertor::None),
            Err(KeyError::NotPrimitive)
        ));

        let complex = [("user", json!({"id": 1}))];
        assert!(matches!(
            structural_key(&complex, KeyConvertor::None),
            Err(KeyError::NotPrimitive)
        ));
    }

    #[test]
    fn test_expression_key_primitives_verbatim() {
        assert_eq!(expression_key(&json!("user:7")), "user:7");
        assert_eq!(expression_key(&json!(7)), "7");
        assert_eq!(expression_key(&json!(true)), "true");
        // non-primitive expression results are canonicalized
        assert_eq!(expression_key(&json!({"b": 1, "a": 2})), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn test_unknown_convertor_is_config_error() {
        assert!(KeyConvertor::from_name("fastjson").is_err());
    }
}
