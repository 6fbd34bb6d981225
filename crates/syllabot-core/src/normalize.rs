//! Result normalization: turn any serializable run output into plain data.
//!
//! Records become maps with ordered keys, sequences keep their order with each
//! element normalized, primitives pass through. Applying it twice gives the
//! same value as applying it once.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;

/// Convert any serializable value into normalized plain data.
pub fn normalize<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    let raw = serde_json::to_value(value)?;
    Ok(normalize_value(raw))
}

/// Recursively normalize an existing JSON value.
pub fn normalize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            let mut out = Map::new();
            for (k, v) in entries {
                out.insert(k, normalize_value(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_value).collect()),
        primitive => primitive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Verdict {
        summary: String,
        differences: Vec<Difference>,
        score: Option<f64>,
    }

    #[derive(Serialize)]
    struct Difference {
        section: String,
        pages: Vec<u32>,
    }

    #[test]
    fn test_record_becomes_map() {
        let verdict = Verdict {
            summary: "Chapters 1-3 match".into(),
            differences: vec![Difference {
                section: "4.2".into(),
                pages: vec![41, 42],
            }],
            score: None,
        };
        let value = normalize(&verdict).unwrap();
        assert_eq!(
            value,
            json!({
                "differences": [{"pages": [41, 42], "section": "4.2"}],
                "score": null,
                "summary": "Chapters 1-3 match"
            })
        );
    }

    #[test]
    fn test_primitives_pass_through() {
        assert_eq!(normalize("plain text").unwrap(), json!("plain text"));
        assert_eq!(normalize(&42).unwrap(), json!(42));
        assert_eq!(normalize(&true).unwrap(), json!(true));
    }

    #[test]
    fn test_keys_are_ordered() {
        let value = normalize_value(json!({"z": 1, "a": {"y": 2, "b": 3}}));
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["a", "z"]);
        let inner: Vec<&String> = value["a"].as_object().unwrap().keys().collect();
        assert_eq!(inner, vec!["b", "y"]);
    }

    #[test]
    fn test_idempotent() {
        let samples = vec![
            json!(null),
            json!("text"),
            json!([1, [2, {"b": 1, "a": 2}]]),
            json!({"result": {"items": [{"k": "v"}], "n": 1.5}}),
        ];
        for sample in samples {
            let once = normalize_value(sample);
            let twice = normalize_value(once.clone());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_sequence_order_preserved() {
        let value = normalize(&vec!["c", "a", "b"]).unwrap();
        assert_eq!(value, json!(["c", "a", "b"]));
    }
}
