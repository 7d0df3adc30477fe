// src/answers/decode.rs

use serde::Serialize;

use super::{php, value::Value};
use crate::utils::html::decode_entities;

/// Which encoding produced a decoded answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeFormat {
    /// Nothing stored.
    Empty,
    Serialized,
    Json,
    EntityDecodedJson,
    UnslashedJson,
    /// No encoding matched; the stored string is used as-is.
    Raw,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decoded {
    pub value: Value,
    pub format: DecodeFormat,
}

impl Decoded {
    /// The stored text itself when no structured encoding matched, else "".
    /// Free-text classification falls back to this.
    pub fn raw_fallback<'a>(&self, raw: &'a str) -> &'a str {
        match self.format {
            DecodeFormat::Raw => raw,
            _ => "",
        }
    }
}

type Stage = (DecodeFormat, fn(&str) -> Option<Value>);

/// Tried in order; the first stage that yields a value wins.
const STAGES: [Stage; 4] = [
    (DecodeFormat::Serialized, php::unserialize),
    (DecodeFormat::Json, json),
    (DecodeFormat::EntityDecodedJson, entity_decoded_json),
    (DecodeFormat::UnslashedJson, unslashed_json),
];

/// Decodes a stored answer blob written by any of the historical encoders.
///
/// Total: every input maps to some value; unrecognised input comes back as
/// `Value::Text` with `DecodeFormat::Raw`.
pub fn decode(raw: Option<&str>) -> Decoded {
    let raw = match raw {
        Some(r) if !r.is_empty() => r,
        _ => {
            return Decoded {
                value: Value::Null,
                format: DecodeFormat::Empty,
            };
        }
    };

    STAGES
        .iter()
        .find_map(|(format, stage)| {
            stage(raw).map(|value| Decoded {
                value,
                format: *format,
            })
        })
        .unwrap_or_else(|| Decoded {
            value: Value::Text(raw.to_string()),
            format: DecodeFormat::Raw,
        })
}

/// Shorthand for callers that only need the value.
pub fn decode_value(raw: Option<&str>) -> Value {
    decode(raw).value
}

fn json(raw: &str) -> Option<Value> {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .map(Value::from_json)
}

fn entity_decoded_json(raw: &str) -> Option<Value> {
    json(&decode_entities(raw))
}

fn unslashed_json(raw: &str) -> Option<Value> {
    json(&strip_slashes(&decode_entities(raw)))
}

/// Removes one level of backslash escaping; `\0` becomes a NUL character and
/// a trailing lone backslash is dropped.
pub fn strip_slashes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('\0'),
            Some(next) => out.push(next),
            None => {}
        }
    }
    out
}
