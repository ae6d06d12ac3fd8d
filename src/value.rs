//! Runtime value algebra shared by parameters, property templates and the
//! variable-length traversal engine.
//!
//! The host engine stores properties in its own variant encoding; on the
//! front-end side we only need enough of that algebra to express parameter
//! values, property maps and the containment test used by `{props}`
//! templates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A tagged variant value.
///
/// Maps use a `BTreeMap` so serialization and `Display` output are
/// deterministic regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Deep containment: `self ⊇ template`.
    ///
    /// - Maps: every key of `template` is present in `self` with a
    ///   containing value.
    /// - Lists: equal length and element-wise containment.
    /// - Scalars: plain equality.
    ///
    /// This is the single containment routine used both for the
    /// property-containment predicates the planner emits and for the
    /// per-edge templates the traversal engine evaluates.
    pub fn contains(&self, template: &Value) -> bool {
        match (self, template) {
            (Value::Map(own), Value::Map(wanted)) => wanted
                .iter()
                .all(|(key, value)| own.get(key).is_some_and(|v| v.contains(value))),
            (Value::List(own), Value::List(wanted)) => {
                own.len() == wanted.len()
                    && own.iter().zip(wanted.iter()).all(|(a, b)| a.contains(b))
            }
            (a, b) => a == b,
        }
    }

    /// Convenience constructor for property maps in tests and fixtures.
    pub fn map<I, K>(entries: I) -> Value
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect::<BTreeMap<_, _>>(),
        )
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::String(s) => write!(f, "'{}'", s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_containment_is_equality() {
        assert!(Value::Integer(4).contains(&Value::Integer(4)));
        assert!(!Value::Integer(4).contains(&Value::Integer(5)));
        assert!(!Value::Integer(4).contains(&Value::Float(4.0)));
        assert!(Value::Null.contains(&Value::Null));
    }

    #[test]
    fn test_map_containment_is_subset() {
        let props = Value::map([
            ("name", Value::String("Ada".into())),
            ("age", Value::Integer(36)),
        ]);
        let wanted = Value::map([("name", Value::String("Ada".into()))]);
        assert!(props.contains(&wanted));
        assert!(!wanted.contains(&props));
        assert!(props.contains(&Value::map::<_, String>([])));
    }

    #[test]
    fn test_nested_containment() {
        let props = Value::map([(
            "address",
            Value::map([
                ("city", Value::String("Oslo".into())),
                ("zip", Value::String("0150".into())),
            ]),
        )]);
        let wanted = Value::map([("address", Value::map([("city", Value::String("Oslo".into()))]))]);
        assert!(props.contains(&wanted));
    }

    #[test]
    fn test_list_containment_elementwise() {
        let a = Value::List(vec![Value::Integer(1), Value::Integer(2)]);
        let b = Value::List(vec![Value::Integer(1), Value::Integer(2)]);
        let short = Value::List(vec![Value::Integer(1)]);
        assert!(a.contains(&b));
        assert!(!a.contains(&short));
    }

    #[test]
    fn test_from_json() {
        let json: serde_json::Value = serde_json::json!({"k": [1, 2.5, "x", null, true]});
        let value = Value::from(json);
        assert_eq!(
            value,
            Value::map([(
                "k",
                Value::List(vec![
                    Value::Integer(1),
                    Value::Float(2.5),
                    Value::String("x".into()),
                    Value::Null,
                    Value::Bool(true),
                ])
            )])
        );
    }

    #[test]
    fn test_display_is_deterministic() {
        let v = Value::map([("b", Value::Integer(2)), ("a", Value::Integer(1))]);
        assert_eq!(v.to_string(), "{a: 1, b: 2}");
    }
}
