//! Canonical key encoding for structured values.
//!
//! Produces a deterministic JSON string for a value with object keys sorted,
//! so two structurally equal values always map to the same key regardless of
//! the order their fields were inserted in. Used to index documents by a
//! structured identifier.
//!
//! ```
//! use serde_json::json;
//! use switchboard::canonical::canonical_key;
//!
//! let a = canonical_key(&json!({"a": 1, "b": 2})).unwrap();
//! let b = canonical_key(&json!({"b": 2, "a": 1})).unwrap();
//! assert_eq!(a, b);
//! ```

use crate::config::KeyConfig;
use crate::{Result, SwitchboardError};
use serde::Serialize;
use serde_json::Value;

/// Encode a value as its canonical key.
///
/// Fails with [`SwitchboardError::CyclicValue`] when nesting runs deeper than
/// [`KeyConfig::MAX_DEPTH`].
pub fn canonical_key(value: &Value) -> Result<String> {
    let mut out = String::new();
    write_value(value, 0, &mut out)?;
    Ok(out)
}

/// Encode any serializable value as its canonical key.
pub fn canonical_key_of<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    canonical_key(&serde_json::to_value(value)?)
}

fn write_value(value: &Value, depth: usize, out: &mut String) -> Result<()> {
    match value {
        Value::Array(items) => {
            let depth = descend(depth)?;
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, depth, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let depth = descend(depth)?;
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_value(&map[key.as_str()], depth, out)?;
            }
            out.push('}');
        }
        scalar => out.push_str(&serde_json::to_string(scalar)?),
    }
    Ok(())
}

fn descend(depth: usize) -> Result<usize> {
    if depth >= KeyConfig::MAX_DEPTH {
        return Err(SwitchboardError::CyclicValue {
            depth: KeyConfig::MAX_DEPTH,
        });
    }
    Ok(depth + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert_eq!(canonical_key(&json!(null)).unwrap(), "null");
        assert_eq!(canonical_key(&json!(12)).unwrap(), "12");
        assert_eq!(canonical_key(&json!("Sheet1")).unwrap(), "\"Sheet1\"");
        assert_eq!(canonical_key(&json!(true)).unwrap(), "true");
    }

    #[test]
    fn test_key_order_independent() {
        let a = canonical_key(&json!({"b": 2, "a": 1, "c": {"z": 0, "y": [1, 2]}})).unwrap();
        let b = canonical_key(&json!({"c": {"y": [1, 2], "z": 0}, "a": 1, "b": 2})).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, r#"{"a":1,"b":2,"c":{"y":[1,2],"z":0}}"#);
    }

    #[test]
    fn test_array_order_is_significant() {
        let a = canonical_key(&json!([1, 2])).unwrap();
        let b = canonical_key(&json!([2, 1])).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_idempotent_and_non_mutating() {
        let value = json!({"doc": "x", "part": 3});
        let before = value.clone();
        let first = canonical_key(&value).unwrap();
        let second = canonical_key(&value).unwrap();
        assert_eq!(first, second);
        assert_eq!(value, before);
    }

    #[test]
    fn test_runaway_nesting_is_reported_as_cycle() {
        let mut value = json!(0);
        for _ in 0..(KeyConfig::MAX_DEPTH + 1) {
            value = json!([value]);
        }
        match canonical_key(&value) {
            Err(SwitchboardError::CyclicValue { depth }) => assert_eq!(depth, KeyConfig::MAX_DEPTH),
            other => panic!("Expected CyclicValue, got: {:?}", other),
        }
    }

    #[test]
    fn test_nesting_at_limit_is_accepted() {
        let mut value = json!(0);
        for _ in 0..KeyConfig::MAX_DEPTH {
            value = json!({ "k": value });
        }
        assert!(canonical_key(&value).is_ok());
    }

    #[test]
    fn test_serializable_values() {
        #[derive(Serialize)]
        struct DocId {
            sheet: String,
            book: u32,
        }
        let key = canonical_key_of(&DocId {
            sheet: "s".into(),
            book: 4,
        })
        .unwrap();
        assert_eq!(key, r#"{"book":4,"sheet":"s"}"#);
    }
}
