// src/answers/value.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::{Serialize, Serializer, ser::SerializeMap};

static NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?$").expect("valid regex")
});

/// A decoded answer payload.
///
/// Both legacy serialized blobs and JSON land in this shape, so classification
/// can match structurally. Associative keys are always strings; integer keys
/// of serialized arrays are stored in their decimal form.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Array whose keys were exactly `0..n-1` in order.
    List(Vec<Value>),
    /// Any other associative array, insertion order preserved.
    Map(Vec<(String, Value)>),
    /// Serialized object. Field names keep their visibility mangling
    /// (`\0*\0name` for protected, `\0Class\0name` for private).
    Object {
        class: String,
        fields: Vec<(String, Value)>,
    },
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Array-like (list or map), i.e. what the legacy code treated as an array.
    pub fn is_array(&self) -> bool {
        matches!(self, Value::List(_) | Value::Map(_))
    }

    /// Loose truthiness: `null`, `false`, `0`, `0.0`, `""`, `"0"` and empty arrays are false.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !(s.is_empty() || s == "0"),
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            Value::Object { .. } => true,
        }
    }

    /// Numbers, and strings that read as a decimal or exponent number
    /// (surrounding whitespace allowed).
    pub fn is_numeric(&self) -> bool {
        match self {
            Value::Int(_) | Value::Float(_) => true,
            Value::Text(s) => is_numeric_str(s),
            _ => false,
        }
    }

    /// Integer cast of a scalar. Non-numeric text and compound values yield `None`.
    pub fn as_index(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Text(s) if is_numeric_str(s) => {
                let t = s.trim();
                t.parse::<i64>()
                    .ok()
                    .or_else(|| {
                        t.parse::<f64>()
                            .ok()
                            .filter(|f| f.is_finite())
                            .map(|f| f.trunc() as i64)
                    })
            }
            _ => None,
        }
    }

    /// String form of a scalar (`true` → "1", `false`/`null` → ""). `None` for compound values.
    pub fn scalar_string(&self) -> Option<String> {
        match self {
            Value::Null => Some(String::new()),
            Value::Bool(true) => Some("1".to_string()),
            Value::Bool(false) => Some(String::new()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(format_float(*f)),
            Value::Text(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Text(_)
        )
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Looks up an array key. Lists answer to their decimal positions.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::List(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Looks up an array key, treating an explicit `null` as absent.
    pub fn get_set(&self, key: &str) -> Option<&Value> {
        self.get(key).filter(|v| !v.is_null())
    }

    /// Key/value pairs of an array or object, in stored order.
    pub fn entries(&self) -> Vec<(String, &Value)> {
        match self {
            Value::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
            Value::Map(entries) | Value::Object { fields: entries, .. } => {
                entries.iter().map(|(k, v)| (k.clone(), v)).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Values of an array (not an object), in stored order.
    pub fn array_values(&self) -> Vec<&Value> {
        match self {
            Value::List(items) => items.iter().collect(),
            Value::Map(entries) => entries.iter().map(|(_, v)| v).collect(),
            _ => Vec::new(),
        }
    }

    /// Elements of an array whose keys are exactly `0..n-1` in order.
    /// JSON objects keyed `"0"`, `"1"`, … qualify as well.
    pub fn dense_elements(&self) -> Option<Vec<&Value>> {
        match self {
            Value::List(items) => Some(items.iter().collect()),
            Value::Map(entries) => entries
                .iter()
                .enumerate()
                .all(|(i, (k, _))| *k == i.to_string())
                .then(|| entries.iter().map(|(_, v)| v).collect()),
            _ => None,
        }
    }

    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect())
            }
        }
    }
}

pub fn is_numeric_str(s: &str) -> bool {
    NUMERIC.is_match(s.trim())
}

/// Shortest decimal form, without a trailing `.0` on integral values.
pub fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

/// Debug dumps render values as plain JSON; objects carry their class name.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::List(items) => items.serialize(serializer),
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Object { class, fields } => {
                let mut map = serializer.serialize_map(Some(fields.len() + 1))?;
                map.serialize_entry("__class", class)?;
                for (k, v) in fields {
                    map.serialize_entry(&k.replace('\0', "\\0"), v)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_follows_loose_rules() {
        assert!(!Value::Text("0".into()).truthy());
        assert!(!Value::Text(String::new()).truthy());
        assert!(Value::Text("0.0".into()).truthy());
        assert!(!Value::List(vec![]).truthy());
        assert!(!Value::Float(0.0).truthy());
        assert!(Value::Int(-1).truthy());
    }

    #[test]
    fn numeric_strings() {
        assert!(Value::Text(" 12".into()).is_numeric());
        assert!(Value::Text("1.5e3".into()).is_numeric());
        assert!(!Value::Text("12abc".into()).is_numeric());
        assert!(!Value::Text("inf".into()).is_numeric());
        assert_eq!(Value::Text("3.9".into()).as_index(), Some(3));
    }

    #[test]
    fn json_objects_with_positional_keys_are_dense() {
        let v = Value::from_json(serde_json::json!({"0": 1, "1": 0}));
        assert_eq!(v.dense_elements().map(|e| e.len()), Some(2));

        let v = Value::from_json(serde_json::json!({"1": 1, "0": 0}));
        assert!(v.dense_elements().is_none());
    }
}
