//! Large-integer coercion ("objectify").
//!
//! Any integer that would not survive a round-trip through an IEEE-754
//! double losslessly, or whose key contains `permissions`, is rewritten to
//! its decimal string form before a frame goes out on the wire. This is a
//! compatibility contract with client SDKs whose numeric type is a double,
//! not a contract this codec is free to relax.

use serde_json::Value;

/// Walk `value` in place, stringifying integers outside `i32` range and any
/// integer value keyed by a name containing `permissions`.
pub fn normalize_integers(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if let Value::Number(n) = v {
                    if let Some(i) = n.as_i64() {
                        if needs_stringify(i, key) {
                            *v = Value::String(i.to_string());
                            continue;
                        }
                    } else if let Some(u) = n.as_u64() {
                        if u > i32::MAX as u64 || key.contains("permissions") {
                            *v = Value::String(u.to_string());
                            continue;
                        }
                    }
                }
                normalize_integers(v);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                normalize_integers(item);
            }
        }
        _ => {}
    }
}

fn needs_stringify(i: i64, key: &str) -> bool {
    i < i32::MIN as i64 || i > i32::MAX as i64 || key.contains("permissions")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn leaves_small_integers_alone() {
        let mut v = json!({"count": 42});
        normalize_integers(&mut v);
        assert_eq!(v["count"], 42);
    }

    #[test]
    fn stringifies_integers_outside_i32_range() {
        let mut v = json!({"id": 9007199254740993u64});
        normalize_integers(&mut v);
        assert_eq!(v["id"], "9007199254740993");
    }

    #[test]
    fn stringifies_any_permissions_key_regardless_of_magnitude() {
        let mut v = json!({"permissions": 8});
        normalize_integers(&mut v);
        assert_eq!(v["permissions"], "8");
    }

    #[test]
    fn recurses_into_nested_objects_and_arrays() {
        let mut v = json!({
            "channels": [
                {"id": 1, "allow_permissions": 16},
                {"id": 9007199254740993u64}
            ]
        });
        normalize_integers(&mut v);
        assert_eq!(v["channels"][0]["id"], 1);
        assert_eq!(v["channels"][0]["allow_permissions"], "16");
        assert_eq!(v["channels"][1]["id"], "9007199254740993");
    }
}
