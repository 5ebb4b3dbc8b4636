//! Order-independent structural hashing of JSON values.
//!
//! Used as the deduplication key for mesh primitives: two primitive
//! descriptors that differ only in key order, or only in an ignored key such
//! as `material`, produce the same hash. The hash is not cryptographic.

use std::fmt::Write;

use serde_json::Value;
use xxhash_rust::xxh3::xxh3_64;

/// Canonical token written for JSON `null`.
const NULL_TOKEN: &str = "~";

/// Hash `value`, skipping every object key listed in `ignored_keys` at any
/// nesting depth.
pub fn structural_hash(value: &Value, ignored_keys: &[&str]) -> u64 {
    let mut canonical = String::new();
    write_canonical(value, ignored_keys, &mut canonical);
    xxh3_64(canonical.as_bytes())
}

/// Canonical text form of `value`: object keys sorted, ignored keys removed.
pub fn canonical_string(value: &Value, ignored_keys: &[&str]) -> String {
    let mut out = String::new();
    write_canonical(value, ignored_keys, &mut out);
    out
}

fn write_canonical(value: &Value, ignored_keys: &[&str], out: &mut String) {
    match value {
        Value::Null => out.push_str(NULL_TOKEN),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            let _ = write!(out, "{}", n);
        }
        Value::String(s) => {
            let _ = write!(out, "{:?}", s);
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, ignored_keys, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map
                .keys()
                .filter(|k| !ignored_keys.contains(&k.as_str()))
                .collect();
            keys.sort();

            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{:?}:", key);
                write_canonical(&map[key.as_str()], ignored_keys, out);
            }
            out.push('}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_independent() {
        let a = json!({"attributes": {"POSITION": 0, "NORMAL": 1}, "indices": 2});
        let b = json!({"indices": 2, "attributes": {"NORMAL": 1, "POSITION": 0}});
        assert_eq!(structural_hash(&a, &[]), structural_hash(&b, &[]));
    }

    #[test]
    fn test_ignored_keys() {
        let a = json!({"attributes": {"POSITION": 0}, "material": 0});
        let b = json!({"attributes": {"POSITION": 0}, "material": 3});
        assert_ne!(structural_hash(&a, &[]), structural_hash(&b, &[]));
        assert_eq!(
            structural_hash(&a, &["material"]),
            structural_hash(&b, &["material"])
        );
    }

    #[test]
    fn test_structural_difference() {
        let a = json!({"attributes": {"POSITION": 0}});
        let b = json!({"attributes": {"POSITION": 1}});
        let c = json!({"attributes": {"POSITION": 0}, "mode": 1});
        assert_ne!(structural_hash(&a, &[]), structural_hash(&b, &[]));
        assert_ne!(structural_hash(&a, &[]), structural_hash(&c, &[]));
    }

    #[test]
    fn test_arrays_are_ordered() {
        let a = json!([1, 2, 3]);
        let b = json!([3, 2, 1]);
        assert_ne!(structural_hash(&a, &[]), structural_hash(&b, &[]));
    }

    #[test]
    fn test_canonical_form() {
        let v = json!({"b": null, "a": [true, "x"]});
        assert_eq!(canonical_string(&v, &[]), r#"{"a":[true,"x"],"b":~}"#);
    }
}
