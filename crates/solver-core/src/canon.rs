// SPDX-License-Identifier: MIT OR Apache-2.0
//! The canonical JSON codec.
//!
//! This is the *only* code path allowed to produce bytes that get hashed.
//! Every other crate in the workspace that needs deterministic bytes calls
//! into [`canonical_bytes`] or [`canonical_string`] rather than serializing
//! on its own.
//!
//! Rules (mirrors the wire contract exactly):
//!
//! 1. Object keys are sorted by Unicode code-point ascending, at every level.
//! 2. Arrays preserve input order; their elements are recursively canonicalized.
//! 3. No insignificant whitespace.
//! 4. Strings use serde_json's JSON escape set.
//! 5. Numbers: integers only — no decimal point, no exponent. Floats are forbidden.
//! 6. `null` is emitted literally; missing keys are omitted, never serialized as `null`.
//! 7. No BOM, no trailing newline.

use serde::Serialize;
use serde_json::Value;
use std::fmt::Write as _;
use thiserror::Error;

/// Failures raised by the canonical codec.
#[derive(Debug, Error, PartialEq)]
pub enum CanonError {
    /// The value could not be represented as JSON at all.
    #[error("value is not representable as JSON: {0}")]
    NotJson(String),

    /// A floating-point number was found somewhere in the hashed region.
    ///
    /// Producers must re-encode fractional quantities as integers (e.g. cents)
    /// or as strings before handing the value to this codec.
    #[error("floating-point value forbidden in canonical/hashed region at {path}")]
    FloatForbidden {
        /// JSON-pointer-like path to the offending value, for diagnostics.
        path: String,
    },
}

/// Canonicalize any [`Serialize`] value into canonical JSON bytes.
///
/// # Errors
///
/// Returns [`CanonError::NotJson`] if the value cannot be serialized to JSON
/// at all, or [`CanonError::FloatForbidden`] if it contains a float.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonError> {
    canonical_string(value).map(String::into_bytes)
}

/// Canonicalize any [`Serialize`] value into a canonical JSON string.
///
/// # Errors
///
/// See [`canonical_bytes`].
pub fn canonical_string<T: Serialize>(value: &T) -> Result<String, CanonError> {
    let v = serde_json::to_value(value).map_err(|e| CanonError::NotJson(e.to_string()))?;
    let mut out = String::new();
    write_canonical(&v, "$", &mut out)?;
    Ok(out)
}

/// Canonicalize a pre-decoded [`serde_json::Value`] directly, without going
/// through a typed [`Serialize`] impl first.
///
/// # Errors
///
/// Returns [`CanonError::FloatForbidden`] if a float is found anywhere in `value`.
pub fn canonicalize_value(value: &Value) -> Result<String, CanonError> {
    let mut out = String::new();
    write_canonical(value, "$", &mut out)?;
    Ok(out)
}

fn write_canonical(v: &Value, path: &str, out: &mut String) -> Result<(), CanonError> {
    match v {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            if n.is_f64() {
                return Err(CanonError::FloatForbidden {
                    path: path.to_string(),
                });
            }
            // serde_json's own Display for Number is already the shortest
            // round-trippable integer form with no exponent or trailing zero.
            write!(out, "{n}").expect("writing to a String cannot fail");
        }
        Value::String(s) => write_json_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, &format!("{path}[{i}]"), out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json_string(key, out);
                out.push(':');
                // serde_json's Map never stores an explicit `null` for a
                // missing field — callers that want "omit if absent"
                // semantics skip the field at the Serialize layer via
                // `skip_serializing_if`; anything that does reach us as an
                // object value is emitted, `null` included, per rule 6.
                write_canonical(&map[*key], &format!("{path}.{key}"), out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

/// Write `s` as a JSON string literal using the same escape set as
/// `serde_json`'s own string serializer (delegated to, for correctness).
fn write_json_string(s: &str, out: &mut String) {
    // serde_json::to_string on a bare &str always yields a minimal, correctly
    // escaped JSON string literal with no surrounding insignificant bytes.
    let escaped = serde_json::to_string(s).expect("string serialization cannot fail");
    out.push_str(&escaped);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys_at_every_level() {
        let a = json!({"b": 1, "a": {"z": 1, "y": 2}});
        let b = json!({"a": {"y": 2, "z": 1}, "b": 1});
        assert_eq!(
            canonicalize_value(&a).unwrap(),
            canonicalize_value(&b).unwrap()
        );
        assert_eq!(canonicalize_value(&a).unwrap(), r#"{"a":{"y":2,"z":1},"b":1}"#);
    }

    #[test]
    fn preserves_array_order() {
        let v = json!([3, 1, 2]);
        assert_eq!(canonicalize_value(&v).unwrap(), "[3,1,2]");
    }

    #[test]
    fn integers_have_no_decimal_point() {
        let v = json!({"n": 42});
        assert_eq!(canonicalize_value(&v).unwrap(), r#"{"n":42}"#);
    }

    #[test]
    fn rejects_floats() {
        let v = json!({"n": 1.5});
        let err = canonicalize_value(&v).unwrap_err();
        assert!(matches!(err, CanonError::FloatForbidden { .. }));
    }

    #[test]
    fn null_is_literal_but_missing_keys_are_omitted() {
        #[derive(Serialize)]
        struct S {
            #[serde(skip_serializing_if = "Option::is_none")]
            maybe: Option<i32>,
            present: Option<i32>,
        }
        let s = S {
            maybe: None,
            present: None,
        };
        let out = canonical_string(&s).unwrap();
        assert_eq!(out, r#"{"present":null}"#);
    }

    #[test]
    fn no_whitespace_no_trailing_newline() {
        let v = json!({"a": [1, 2], "b": "x"});
        let out = canonicalize_value(&v).unwrap();
        assert!(!out.contains(' '));
        assert!(!out.ends_with('\n'));
    }

    #[test]
    fn escapes_strings_like_serde_json() {
        let v = json!({"s": "line\nbreak \"quoted\""});
        let out = canonicalize_value(&v).unwrap();
        assert_eq!(out, r#"{"s":"line\nbreak \"quoted\""}"#);
    }

    #[test]
    fn permutation_of_keys_yields_identical_bytes() {
        let a = json!({"x": 1, "y": 2, "z": 3});
        let b = json!({"z": 3, "x": 1, "y": 2});
        let c = json!({"y": 2, "z": 3, "x": 1});
        let ca = canonicalize_value(&a).unwrap();
        assert_eq!(ca, canonicalize_value(&b).unwrap());
        assert_eq!(ca, canonicalize_value(&c).unwrap());
    }
}
