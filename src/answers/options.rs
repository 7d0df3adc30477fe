// src/answers/options.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::{
    decode::{decode_value, strip_slashes},
    value::Value,
};
use crate::utils::html::{decode_entities, strip_tags};

/// Legacy answer-object pairs: `"answer";s:N:"…";` … `"correct";b:0|1;`.
static ANSWER_WITH_FLAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)"answer";s:[0-9]+:"(.*?)";.*?"correct";b:(0|1);"#).expect("valid regex")
});

static ANSWER_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)"answer";s:[0-9]+:"(.*?)";"#).expect("valid regex"));

/// `\0*\0` (protected) and `\0Class\0` (private) field-name prefixes.
static MANGLED_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\x00[^\x00]*\x00").expect("valid regex"));

/// One selectable answer choice of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerOption {
    pub text: String,
    pub is_correct: bool,
}

impl AnswerOption {
    /// Builds an option from stored markup: entities decoded, tags stripped.
    fn from_markup(text: &str, is_correct: bool) -> Self {
        Self {
            text: strip_tags(&decode_entities(text)),
            is_correct,
        }
    }
}

/// The historical shapes a stored option element comes in.
enum RawOption<'a> {
    /// Serialized answer object; fields are matched by name fragment.
    TaggedObject(&'a [(String, Value)]),
    /// Array with `answer`/`html`/`title` text and a `correct` flag.
    KeyedMap(&'a Value),
    PlainString(&'a str),
}

impl<'a> RawOption<'a> {
    fn classify(value: &'a Value) -> Option<Self> {
        match value {
            Value::Object { fields, .. } => Some(RawOption::TaggedObject(fields)),
            Value::List(_) | Value::Map(_) => Some(RawOption::KeyedMap(value)),
            Value::Text(s) => Some(RawOption::PlainString(s)),
            _ => None,
        }
    }

    fn into_option(self) -> AnswerOption {
        match self {
            RawOption::TaggedObject(fields) => {
                let mut text = String::new();
                let mut is_correct = false;
                for (name, value) in fields {
                    let name = MANGLED_PREFIX.replace(name, "");
                    if name.contains("answer") {
                        text = value.scalar_string().unwrap_or_default();
                    }
                    if name.contains("correct") {
                        is_correct = value.truthy();
                    }
                }
                AnswerOption::from_markup(&text, is_correct)
            }
            RawOption::KeyedMap(map) => {
                let text = ["answer", "html", "title"]
                    .iter()
                    .find_map(|key| map.get_set(key))
                    .and_then(Value::scalar_string)
                    .unwrap_or_default();
                let is_correct = map.get("correct").is_some_and(Value::truthy);
                AnswerOption::from_markup(&text, is_correct)
            }
            RawOption::PlainString(s) => AnswerOption::from_markup(s, false),
        }
    }
}

/// Reconstructs a question's ordered option list from its stored answer data.
///
/// Positions in the returned vector are the indices user answers refer to.
pub fn extract_options(raw_options: Option<&str>) -> Vec<AnswerOption> {
    let from_decoded = from_decoded(&decode_value(raw_options));
    if !from_decoded.is_empty() {
        return from_decoded;
    }

    match raw_options {
        Some(raw) if !raw.is_empty() => from_legacy_grammar(raw),
        _ => Vec::new(),
    }
}

fn from_decoded(decoded: &Value) -> Vec<AnswerOption> {
    decoded
        .array_values()
        .into_iter()
        .filter_map(RawOption::classify)
        .map(RawOption::into_option)
        .collect()
}

/// Pattern scan over serialized text that failed to decode, e.g. after a
/// charset conversion broke the byte lengths.
fn from_legacy_grammar(raw: &str) -> Vec<AnswerOption> {
    let paired: Vec<AnswerOption> = ANSWER_WITH_FLAG
        .captures_iter(raw)
        .map(|cap| AnswerOption::from_markup(&strip_slashes(&cap[1]), &cap[2] == "1"))
        .collect();
    if !paired.is_empty() {
        return paired;
    }

    ANSWER_ONLY
        .captures_iter(raw)
        .map(|cap| AnswerOption::from_markup(&strip_slashes(&cap[1]), false))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(options: &[AnswerOption]) -> Vec<&str> {
        options.iter().map(|o| o.text.as_str()).collect()
    }

    #[test]
    fn serialized_answer_objects() {
        let raw = concat!(
            "a:2:{",
            "i:0;O:27:\"WpProQuiz_Model_AnswerTypes\":2:{s:10:\"\0*\0_answer\";s:13:\"<b>Paris</b> \";s:11:\"\0*\0_correct\";b:1;}",
            "i:1;O:27:\"WpProQuiz_Model_AnswerTypes\":2:{s:10:\"\0*\0_answer\";s:6:\"London\";s:11:\"\0*\0_correct\";b:0;}",
            "}"
        );
        let options = extract_options(Some(raw));
        assert_eq!(
            options,
            vec![
                AnswerOption { text: "Paris".into(), is_correct: true },
                AnswerOption { text: "London".into(), is_correct: false },
            ]
        );
    }

    #[test]
    fn keyed_maps_prefer_answer_then_html_then_title() {
        let raw = r#"[{"answer":"A &amp; B","correct":1},{"html":"<i>C</i>"},{"title":"D","correct":"0"},"E"]"#;
        let options = extract_options(Some(raw));
        assert_eq!(texts(&options), vec!["A & B", "C", "D", "E"]);
        assert_eq!(
            options.iter().map(|o| o.is_correct).collect::<Vec<_>>(),
            vec![true, false, false, false]
        );
    }

    #[test]
    fn broken_serialization_falls_back_to_pattern_scan() {
        // Byte length of the first answer is wrong, so the blob does not parse.
        let raw = r#"a:2:{i:0;a:2:{s:6:"answer";s:2:"Yes";s:7:"correct";b:1;}i:1;a:2:{s:6:"answer";s:2:"No";s:7:"correct";b:0;}}"#;
        let options = extract_options(Some(raw));
        assert_eq!(texts(&options), vec!["Yes", "No"]);
        assert!(options[0].is_correct);
        assert!(!options[1].is_correct);
    }

    #[test]
    fn pattern_scan_without_flags_marks_everything_incorrect() {
        let raw = r#"garbage "answer";s:3:"It\'s"; more "answer";s:1:"B";"#;
        let options = extract_options(Some(raw));
        assert_eq!(texts(&options), vec!["It's", "B"]);
        assert!(options.iter().all(|o| !o.is_correct));
    }

    #[test]
    fn extraction_is_deterministic() {
        let raw = r#"[{"answer":"x"},{"answer":"y"},{"answer":"z"}]"#;
        assert_eq!(extract_options(Some(raw)), extract_options(Some(raw)));
    }

    #[test]
    fn nothing_stored_means_no_options() {
        assert!(extract_options(None).is_empty());
        assert!(extract_options(Some("plain words")).is_empty());
    }
}
