//! Scrubs untrusted request payloads before they reach the dispatcher.
//!
//! Keys that could poison prototype-style lookups or inject store operators
//! (`__proto__`, `constructor`, `prototype`, `$`-prefixed, dotted) are
//! dropped. Nesting beyond [`MAX_DEPTH`] collapses to an empty container,
//! and at most [`MAX_KEYS`] object keys survive per payload.

use serde_json::{Map, Value};

pub const MAX_DEPTH: usize = 8;
pub const MAX_KEYS: usize = 2000;

fn is_dangerous_key(key: &str) -> bool {
    matches!(key, "__proto__" | "constructor" | "prototype") || key.starts_with('$') || key.contains('.')
}

struct Budget {
    max_depth: usize,
    keys_left: usize,
}

fn sanitize_value(value: Value, depth: usize, budget: &mut Budget) -> Value {
    match value {
        Value::Array(items) => {
            if depth >= budget.max_depth {
                return Value::Array(Vec::new());
            }
            Value::Array(
                items
                    .into_iter()
                    .map(|item| sanitize_value(item, depth + 1, budget))
                    .collect(),
            )
        }
        Value::Object(map) => {
            if depth >= budget.max_depth {
                return Value::Object(Map::new());
            }
            Value::Object(sanitize_map(map, depth, budget))
        }
        scalar => scalar,
    }
}

fn sanitize_map(map: Map<String, Value>, depth: usize, budget: &mut Budget) -> Map<String, Value> {
    let mut safe = Map::new();
    for (key, value) in map {
        if budget.keys_left == 0 {
            break;
        }
        if is_dangerous_key(&key) {
            continue;
        }
        budget.keys_left -= 1;
        let value = sanitize_value(value, depth + 1, budget);
        safe.insert(key, value);
    }
    safe
}

/// Sanitizes one top-level payload object.
pub fn sanitize_payload(payload: Map<String, Value>) -> Map<String, Value> {
    let mut budget = Budget {
        max_depth: MAX_DEPTH,
        keys_left: MAX_KEYS,
    };
    sanitize_map(payload, 0, &mut budget)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_drops_dangerous_keys() {
        let clean = sanitize_payload(object(json!({
            "__proto__": {"admin": true},
            "constructor": 1,
            "$where": "1 == 1",
            "a.b": 2,
            "email": "a@b.co",
            "nested": {"prototype": 1, "ok": true}
        })));
        assert_eq!(
            Value::Object(clean),
            json!({"email": "a@b.co", "nested": {"ok": true}})
        );
    }

    #[test]
    fn test_depth_limit_collapses_containers() {
        let mut deep = json!({"leaf": 1});
        for _ in 0..10 {
            deep = json!({ "n": deep });
        }
        let clean = Value::Object(sanitize_payload(object(deep)));

        let mut cursor = &clean;
        for _ in 0..MAX_DEPTH {
            cursor = &cursor["n"];
        }
        assert_eq!(*cursor, json!({}));
    }

    #[test]
    fn test_key_budget() {
        let mut map = Map::new();
        for i in 0..(MAX_KEYS + 50) {
            map.insert(format!("k{:05}", i), json!(i));
        }
        assert_eq!(sanitize_payload(map).len(), MAX_KEYS);
    }
}
