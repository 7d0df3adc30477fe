// src/models/form.rs

use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};
use validator::Validate;

use crate::answers::Value;

/// A captured form value: a single text, or the checked items of a
/// multi-select/checkbox group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Display form; list items are joined with ", ".
    pub fn display(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::List(items) => items
                .iter()
                .filter(|s| !s.is_empty())
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            FieldValue::Text(s) => Value::Text(s.clone()),
            FieldValue::List(items) => {
                Value::List(items.iter().cloned().map(Value::Text).collect())
            }
        }
    }

    fn from_value(value: &Value) -> Self {
        if value.is_array() {
            FieldValue::List(
                value
                    .array_values()
                    .into_iter()
                    .filter_map(Value::scalar_string)
                    .collect(),
            )
        } else {
            FieldValue::Text(value.scalar_string().unwrap_or_default())
        }
    }
}

/// Normalized field label → value, in first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields(Vec<(String, FieldValue)>);

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field. An existing key keeps its position and takes the new value.
    pub fn insert(&mut self, key: String, value: FieldValue) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last write wins per key.
    pub fn merge(&mut self, newer: FormFields) {
        for (key, value) in newer.0 {
            self.insert(key, value);
        }
    }

    /// Storage form shared with the CMS meta tables.
    pub fn to_value(&self) -> Value {
        Value::Map(self.0.iter().map(|(k, v)| (k.clone(), v.to_value())).collect())
    }

    /// Reads a stored mapping; anything that is not an array is treated as empty.
    pub fn from_value(value: &Value) -> Self {
        let mut fields = FormFields::new();
        if value.is_array() {
            for (key, item) in value.entries() {
                fields.insert(key, FieldValue::from_value(item));
            }
        }
        fields
    }
}

impl Serialize for FormFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Who form data belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "mode", content = "id", rename_all = "snake_case")]
pub enum Identity {
    User(i64),
    /// Anonymous session token kept in a client cookie.
    Guest(String),
}

/// Where a field mapping is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FormSlot {
    /// Fields captured on one page.
    Page { identity: Identity, page_id: i64 },
    /// Cross-page, last-write-wins view.
    Latest { identity: Identity },
}

/// Result of a capture event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveSummary {
    /// `user` or `guest`.
    pub mode: &'static str,
    pub page_id: i64,
    pub count: usize,
}

/// Body of a capture event sent by the form page.
#[derive(Debug, Deserialize, Validate)]
pub struct SaveFormRequest {
    #[serde(default)]
    #[validate(range(min = 0))]
    pub page_id: i64,
    #[validate(custom(function = validate_fields))]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

fn validate_fields(
    fields: &serde_json::Map<String, serde_json::Value>,
) -> Result<(), validator::ValidationError> {
    if fields.len() > 200 {
        return Err(validator::ValidationError::new("too_many_fields"));
    }
    Ok(())
}
