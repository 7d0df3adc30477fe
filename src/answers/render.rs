// src/answers/render.rs

use serde::{Deserialize, Serialize};

use super::{classify::AnswerKind, options::AnswerOption};

/// Shown when nothing at all can be displayed for an answer.
pub const NO_ANSWER: &str = "—";

/// What a choice question displays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Only the chosen options that are correct (falls back to all chosen ones).
    #[default]
    Correct,
    /// Every chosen option.
    Selected,
}

impl DisplayMode {
    /// `selected` (any case) selects `Selected`; everything else means `Correct`.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("selected") {
            DisplayMode::Selected
        } else {
            DisplayMode::Correct
        }
    }
}

/// Turns a classified answer into display strings, duplicates removed.
///
/// Never returns an empty vector: with nothing to show the result is `[NO_ANSWER]`.
pub fn render(
    kind: AnswerKind,
    options: &[AnswerOption],
    chosen_indices: &[i64],
    chosen_texts: &[String],
    mode: DisplayMode,
) -> Vec<String> {
    let parts = match kind {
        AnswerKind::Choice if !options.is_empty() => match mode {
            DisplayMode::Correct => {
                let correct = correct_choices(options, chosen_indices, chosen_texts);
                if correct.is_empty() {
                    selected_choices(options, chosen_indices, chosen_texts)
                } else {
                    correct
                }
            }
            DisplayMode::Selected => selected_choices(options, chosen_indices, chosen_texts),
        },
        AnswerKind::Ordering if !options.is_empty() => {
            let steps: Vec<&str> = chosen_indices
                .iter()
                .filter_map(|i| option_at(options, *i))
                .map(|o| o.text.as_str())
                .collect();
            if steps.is_empty() {
                Vec::new()
            } else {
                vec![steps.join(" > ")]
            }
        }
        // Free text, and choice/ordering questions whose options are unknown.
        _ => chosen_texts
            .iter()
            .filter(|t| !t.is_empty())
            .cloned()
            .collect(),
    };

    let mut unique: Vec<String> = Vec::with_capacity(parts.len());
    for part in parts {
        if !unique.contains(&part) {
            unique.push(part);
        }
    }

    if unique.is_empty() {
        unique.push(NO_ANSWER.to_string());
    }
    unique
}

fn option_at(options: &[AnswerOption], index: i64) -> Option<&AnswerOption> {
    usize::try_from(index).ok().and_then(|i| options.get(i))
}

fn correct_choices(
    options: &[AnswerOption],
    chosen_indices: &[i64],
    chosen_texts: &[String],
) -> Vec<String> {
    let mut parts: Vec<String> = chosen_indices
        .iter()
        .filter_map(|i| option_at(options, *i))
        .filter(|o| o.is_correct)
        .map(|o| o.text.clone())
        .collect();

    let correct_texts: Vec<String> = options
        .iter()
        .filter(|o| o.is_correct)
        .map(|o| o.text.trim().to_lowercase())
        .collect();
    parts.extend(
        chosen_texts
            .iter()
            .filter(|t| correct_texts.contains(&t.trim().to_lowercase()))
            .cloned(),
    );

    parts
}

fn selected_choices(
    options: &[AnswerOption],
    chosen_indices: &[i64],
    chosen_texts: &[String],
) -> Vec<String> {
    chosen_indices
        .iter()
        .filter_map(|i| option_at(options, *i))
        .map(|o| o.text.clone())
        .chain(chosen_texts.iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opt(text: &str, is_correct: bool) -> AnswerOption {
        AnswerOption {
            text: text.to_string(),
            is_correct,
        }
    }

    #[test]
    fn correct_mode_shows_correct_picks() {
        let options = [opt("Paris", true), opt("London", false)];
        assert_eq!(
            render(AnswerKind::Choice, &options, &[0], &[], DisplayMode::Correct),
            vec!["Paris"]
        );
        assert_eq!(
            render(AnswerKind::Choice, &options, &[0], &[], DisplayMode::Selected),
            vec!["Paris"]
        );
    }

    #[test]
    fn correct_mode_falls_back_to_what_was_picked() {
        let options = [opt("A", false), opt("B", true)];
        assert_eq!(
            render(AnswerKind::Choice, &options, &[0], &[], DisplayMode::Correct),
            vec!["A"]
        );
    }

    #[test]
    fn chosen_text_matches_correct_option_loosely() {
        let options = [opt("Paris", true), opt("London", false)];
        let texts = vec![" paris ".to_string(), "London".to_string()];
        assert_eq!(
            render(AnswerKind::Choice, &options, &[], &texts, DisplayMode::Correct),
            vec![" paris "]
        );
        assert_eq!(
            render(AnswerKind::Choice, &options, &[], &texts, DisplayMode::Selected),
            vec![" paris ", "London"]
        );
    }

    #[test]
    fn ordering_joins_in_submitted_order() {
        let options = [opt("Step1", false), opt("Step2", false), opt("Step3", false)];
        assert_eq!(
            render(AnswerKind::Ordering, &options, &[2, 0, 1], &[], DisplayMode::Correct),
            vec!["Step3 > Step1 > Step2"]
        );
        assert_eq!(
            render(AnswerKind::Ordering, &options, &[7], &[], DisplayMode::Correct),
            vec![NO_ANSWER]
        );
    }

    #[test]
    fn free_text_is_deduplicated() {
        let texts = vec!["a".to_string(), String::new(), "a".to_string(), "b".to_string()];
        assert_eq!(
            render(AnswerKind::FreeText, &[], &[], &texts, DisplayMode::Correct),
            vec!["a", "b"]
        );
    }

    #[test]
    fn nothing_chosen_renders_placeholder() {
        let options = [opt("A", true)];
        assert_eq!(
            render(AnswerKind::Choice, &options, &[], &[], DisplayMode::Correct),
            vec![NO_ANSWER]
        );
        assert_eq!(
            render(AnswerKind::Choice, &options, &[-1, 9], &[], DisplayMode::Selected),
            vec![NO_ANSWER]
        );
    }

    #[test]
    fn display_mode_parsing() {
        assert_eq!(DisplayMode::parse("SELECTED"), DisplayMode::Selected);
        assert_eq!(DisplayMode::parse("anything"), DisplayMode::Correct);
    }
}
