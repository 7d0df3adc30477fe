// src/answers/classify.rs

use serde::Serialize;

use super::{options::AnswerOption, value::Value};
use crate::utils::html::strip_tags;

/// Answer shape, fully determined by the question's declared answer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    Choice,
    Ordering,
    FreeText,
}

impl AnswerKind {
    pub fn from_answer_type(answer_type: &str) -> Self {
        match answer_type {
            "single" | "multiple" | "single_choice" | "multiple_choice" | "assessment_answer" => {
                AnswerKind::Choice
            }
            "sort_answer" | "matrix_sort_answer" => AnswerKind::Ordering,
            _ => AnswerKind::FreeText,
        }
    }
}

/// What the user selected or wrote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub kind: AnswerKind,
    /// Positions into the option list, in submitted order.
    pub chosen_indices: Vec<i64>,
    pub chosen_texts: Vec<String>,
}

impl Classification {
    /// Free-text answers with nothing recoverable must be looked up in the
    /// essay records instead.
    pub fn needs_essay_lookup(&self) -> bool {
        self.kind == AnswerKind::FreeText && self.chosen_texts.is_empty()
    }
}

/// Extracts the user's selection from a decoded answer.
///
/// `raw_fallback` is the stored text when it did not decode to anything
/// structured; free-text answers are read from it if the decoded value is empty.
pub fn classify(
    answer_type: &str,
    decoded: &Value,
    raw_fallback: &str,
    options: &[AnswerOption],
) -> Classification {
    let kind = AnswerKind::from_answer_type(answer_type);
    let mut out = Classification {
        kind,
        chosen_indices: Vec::new(),
        chosen_texts: Vec::new(),
    };

    match kind {
        AnswerKind::Choice => classify_choice(decoded, &mut out),
        AnswerKind::Ordering => {
            out.chosen_indices = flatten(decoded)
                .into_iter()
                .filter(|v| v.is_numeric())
                .filter_map(Value::as_index)
                .collect();
        }
        AnswerKind::FreeText => classify_free_text(decoded, raw_fallback, options, &mut out),
    }

    out
}

fn classify_choice(decoded: &Value, out: &mut Classification) {
    if decoded.is_array() {
        if let Some(flags) = flag_vector(decoded) {
            out.chosen_indices = flags
                .iter()
                .enumerate()
                .filter(|(_, set)| **set)
                .map(|(i, _)| i as i64)
                .collect();
            return;
        }

        for item in decoded.array_values() {
            if let Some(index) = item
                .is_array()
                .then(|| item.get_set("index"))
                .flatten()
            {
                out.chosen_indices.extend(index.as_index());
            } else if item.is_numeric() {
                out.chosen_indices.extend(item.as_index());
            } else if let Some(text) = item.as_text().filter(|t| !t.is_empty()) {
                out.chosen_texts.push(strip_tags(text));
            }
        }
    } else if decoded.is_numeric() {
        out.chosen_indices.extend(decoded.as_index());
    } else if let Some(text) = decoded.as_text().filter(|t| !t.is_empty()) {
        out.chosen_texts.push(strip_tags(text));
    }
}

/// A non-empty array keyed `0..n-1` whose values all read as "0" or "1".
fn flag_vector(decoded: &Value) -> Option<Vec<bool>> {
    let elements = decoded.dense_elements()?;
    if elements.is_empty() {
        return None;
    }
    elements
        .into_iter()
        .map(|v| match v.scalar_string()?.as_str() {
            "1" => Some(true),
            "0" => Some(false),
            _ => None,
        })
        .collect()
}

/// Depth-first values of nested arrays. A scalar flattens to itself; an
/// object at the top level contributes its field values.
fn flatten(value: &Value) -> Vec<&Value> {
    fn walk<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
        if value.is_array() {
            for item in value.array_values() {
                walk(item, out);
            }
        } else {
            out.push(value);
        }
    }

    let mut out = Vec::new();
    match value {
        Value::Null => {}
        Value::Object { fields, .. } => fields.iter().for_each(|(_, v)| walk(v, &mut out)),
        other => walk(other, &mut out),
    }
    out
}

fn classify_free_text(
    decoded: &Value,
    raw_fallback: &str,
    options: &[AnswerOption],
    out: &mut Classification,
) {
    let has_content = decoded.truthy() || decoded.is_numeric();
    if has_content {
        collect_texts(decoded, &mut out.chosen_texts);
    } else if !raw_fallback.is_empty() {
        collect_texts(&Value::Text(raw_fallback.to_string()), &mut out.chosen_texts);
    }

    // Some installs store free-text answers as indices of the canonical answers.
    if out.chosen_texts.is_empty() && !options.is_empty() {
        for index in numeric_indices(decoded) {
            if let Some(option) = usize::try_from(index).ok().and_then(|i| options.get(i)) {
                out.chosen_texts.push(option.text.clone());
            }
        }
    }
}

/// Collects written text, preferring a `text` field at each level. Bare
/// numbers and booleans are not text; they are handled as indices.
fn collect_texts(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::List(_) | Value::Map(_) => {
            if let Some(text) = value.get_set("text").and_then(Value::scalar_string) {
                push_trimmed(&text, out);
            }
            for (key, item) in value.entries() {
                if key != "text" {
                    collect_texts(item, out);
                }
            }
        }
        Value::Text(s) => push_trimmed(s, out),
        _ => {}
    }
}

fn push_trimmed(text: &str, out: &mut Vec<String>) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Indices when the decoded value is purely numeric: a non-negative integer
/// scalar, or a non-empty array of numeric elements.
fn numeric_indices(decoded: &Value) -> Vec<i64> {
    if decoded.is_array() {
        let items = decoded.array_values();
        if !items.is_empty() && items.iter().all(|v| v.is_numeric()) {
            return items.into_iter().filter_map(Value::as_index).collect();
        }
        return Vec::new();
    }

    match decoded.scalar_string() {
        Some(s)
            if decoded.is_scalar() && !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) =>
        {
            decoded.as_index().into_iter().collect()
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::decode::decode_value;

    fn opts(texts: &[&str]) -> Vec<AnswerOption> {
        texts
            .iter()
            .map(|t| AnswerOption {
                text: t.to_string(),
                is_correct: false,
            })
            .collect()
    }

    #[test]
    fn answer_type_decides_kind() {
        assert_eq!(AnswerKind::from_answer_type("single"), AnswerKind::Choice);
        assert_eq!(AnswerKind::from_answer_type("assessment_answer"), AnswerKind::Choice);
        assert_eq!(AnswerKind::from_answer_type("matrix_sort_answer"), AnswerKind::Ordering);
        assert_eq!(AnswerKind::from_answer_type("essay"), AnswerKind::FreeText);
        assert_eq!(AnswerKind::from_answer_type("cloze_answer"), AnswerKind::FreeText);
    }

    #[test]
    fn flag_vectors_select_positions() {
        let decoded = decode_value(Some("a:4:{i:0;i:0;i:1;i:1;i:2;i:0;i:3;i:1;}"));
        let c = classify("multiple", &decoded, "", &[]);
        assert_eq!(c.chosen_indices, vec![1, 3]);
        assert!(c.chosen_texts.is_empty());

        let decoded = decode_value(Some(r#"["0","1"]"#));
        assert_eq!(classify("single", &decoded, "", &[]).chosen_indices, vec![1]);
    }

    #[test]
    fn mixed_choice_payloads() {
        let decoded = decode_value(Some(r#"[{"index":2},"5","<b>Other</b>",""]"#));
        let c = classify("multiple_choice", &decoded, "", &[]);
        assert_eq!(c.chosen_indices, vec![2, 5]);
        assert_eq!(c.chosen_texts, vec!["Other".to_string()]);
    }

    #[test]
    fn scalar_choices() {
        assert_eq!(classify("single", &Value::Int(3), "", &[]).chosen_indices, vec![3]);
        assert_eq!(
            classify("single", &Value::Text("Blue".into()), "", &[]).chosen_texts,
            vec!["Blue".to_string()]
        );
    }

    #[test]
    fn ordering_keeps_submitted_order() {
        let decoded = decode_value(Some("[[2],[0,[1]],\"x\"]"));
        let c = classify("sort_answer", &decoded, "", &[]);
        assert_eq!(c.kind, AnswerKind::Ordering);
        assert_eq!(c.chosen_indices, vec![2, 0, 1]);
    }

    #[test]
    fn free_text_prefers_text_fields() {
        let decoded = decode_value(Some(r#"{"meta":{"text":"  inner "},"text":"outer","n":4}"#));
        let c = classify("free_answer", &decoded, "", &[]);
        assert_eq!(c.chosen_texts, vec!["outer".to_string(), "inner".to_string()]);
    }

    #[test]
    fn free_text_numeric_answers_resolve_to_option_text() {
        let c = classify("free_answer", &Value::Int(1), "", &opts(&["No", "Yes"]));
        assert_eq!(c.chosen_texts, vec!["Yes".to_string()]);

        let decoded = decode_value(Some("[0,1]"));
        let c = classify("free_answer", &decoded, "", &opts(&["No", "Yes"]));
        assert_eq!(c.chosen_texts, vec!["No".to_string(), "Yes".to_string()]);
    }

    #[test]
    fn free_text_reads_undecodable_raw_text() {
        let c = classify("essay", &Value::Text(String::new()), "My essay", &[]);
        assert_eq!(c.chosen_texts, vec!["My essay".to_string()]);
    }

    #[test]
    fn empty_free_text_needs_essay_lookup() {
        let decoded = decode_value(Some(r#"{"graded_id":41}"#));
        let c = classify("essay", &decoded, "", &[]);
        assert!(c.needs_essay_lookup());
    }
}
