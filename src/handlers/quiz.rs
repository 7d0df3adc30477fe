// src/handlers/quiz.rs

use axum::{
    extract::{Query, State},
    response::Html,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{debug_attr, int_attr};
use crate::{
    answers::{DisplayMode, NO_ANSWER},
    error::AppError,
    models::attempt::QuestionRef,
    services::{
        answers::{AnswerOutcome, AnswerService},
        essays::EssayMatch,
    },
    utils::{
        html::{debug_block, escape, escape_multiline},
        jwt::MaybeViewer,
    },
};

const DEFAULT_LABEL: &str = "Your answer";

/// Attributes of the single-question answer view.
#[derive(Debug, Default, Deserialize)]
pub struct QuizAnswerParams {
    pub quiz_id: Option<String>,
    pub question_post_id: Option<String>,
    /// `correct` (default) or `selected`.
    pub show: Option<String>,
    pub label: Option<String>,
    pub debug: Option<String>,
}

/// Renders the viewer's answer to one question of their latest attempt.
pub async fn quiz_answer(
    State(answers): State<AnswerService>,
    MaybeViewer(viewer): MaybeViewer,
    Query(params): Query<QuizAnswerParams>,
) -> Result<Html<String>, AppError> {
    let quiz_post_id = int_attr(params.quiz_id.as_deref());
    let question_post_id = int_attr(params.question_post_id.as_deref());
    if quiz_post_id <= 0 || question_post_id <= 0 {
        return Ok(Html("<em>quiz_id &amp; question_post_id required.</em>".to_string()));
    }

    let Some(viewer) = viewer else {
        return Ok(Html("<em>Log in to view your answer.</em>".to_string()));
    };

    let mode = DisplayMode::parse(params.show.as_deref().unwrap_or_default());
    let rendered = match answers
        .question_answer(viewer.user_id, quiz_post_id, question_post_id, mode)
        .await?
    {
        AnswerOutcome::NoAttempt => {
            return Ok(Html("<em>No attempts found yet for this quiz.</em>".to_string()));
        }
        AnswerOutcome::NotAnswered => {
            return Ok(Html("<em>No recorded answer for this question yet.</em>".to_string()));
        }
        AnswerOutcome::Answered(rendered) => rendered,
    };

    let label = params.label.as_deref().unwrap_or(DEFAULT_LABEL);
    let mut html = format!(
        "<div class=\"ld-question-answer\" style=\"margin:.5rem 0;padding:.75rem;border:1px solid #e5e7eb;border-radius:10px;\"><strong>{}:</strong> {}",
        escape(label),
        escape(&rendered.parts.join(" | "))
    );
    if debug_attr(params.debug.as_deref()) {
        html.push_str(&debug_block(&rendered.trace));
    }
    html.push_str("</div>");

    Ok(Html(html))
}

/// Attributes of the essay view. `question_post_id` may list several ids.
#[derive(Debug, Default, Deserialize)]
pub struct EssayAnswerParams {
    pub quiz_id: Option<String>,
    pub question_post_id: Option<String>,
    pub label: Option<String>,
    pub debug: Option<String>,
}

#[derive(Debug, Serialize)]
struct EssayTrace {
    question_post_id: i64,
    raw_answer: Option<String>,
    essay: Option<EssayMatch>,
}

/// Comma or whitespace separated ids; zero and unparsable entries are dropped.
fn question_ids(raw: &str) -> Vec<i64> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| int_attr(Some(part)))
        .filter(|id| *id != 0)
        .collect()
}

/// Renders the viewer's essay text for each listed question.
pub async fn essay_answer(
    State(answers): State<AnswerService>,
    MaybeViewer(viewer): MaybeViewer,
    Query(params): Query<EssayAnswerParams>,
) -> Result<Html<String>, AppError> {
    let Some(viewer) = viewer else {
        return Ok(Html("<em>Log in to view your essay answers.</em>".to_string()));
    };

    let quiz_post_id = int_attr(params.quiz_id.as_deref());
    if quiz_post_id <= 0 {
        return Ok(Html("<em>quiz_id is required.</em>".to_string()));
    }

    let ids = question_ids(params.question_post_id.as_deref().unwrap_or_default());
    if ids.is_empty() {
        return Ok(Html(
            "<em>question_post_id is required (single or comma-separated).</em>".to_string(),
        ));
    }

    let attempt = answers
        .attempts()
        .find_latest_attempt(viewer.user_id, quiz_post_id)
        .await?;

    let mut blocks = Vec::with_capacity(ids.len());
    let mut traces = Vec::new();
    for question_post_id in ids {
        let answered = match &attempt {
            Some(attempt) => {
                answers
                    .attempts()
                    .find_answered_question(attempt.attempt_id, QuestionRef::Post(question_post_id))
                    .await?
            }
            None => None,
        };

        let essay = answers
            .essays()
            .resolve_essay_text(viewer.user_id, quiz_post_id, question_post_id, answered.as_ref())
            .await?;
        let text = essay.as_ref().map_or(NO_ANSWER, |e| e.text.as_str());
        blocks.push(format!(
            "<div style=\"margin:.5rem 0 .75rem;\"><div style=\"padding:.5rem .75rem;background:#f9fafb;border:1px solid #eef2f7;border-radius:10px;\">{}</div></div>",
            escape_multiline(text)
        ));

        traces.push(EssayTrace {
            question_post_id,
            raw_answer: answered.and_then(|a| a.raw_answer),
            essay,
        });
    }

    let label = params.label.as_deref().unwrap_or(DEFAULT_LABEL);
    let mut html = String::from(
        "<div class=\"ld-essay-answers\" style=\"margin:1rem 0;padding:1rem;border:1px solid #e5e7eb;border-radius:12px;\">",
    );
    html.push_str(&format!(
        "<h3 style=\"margin:0 0 .75rem;font-size:1.05rem;\">{}</h3>",
        escape(label)
    ));
    html.push_str(&blocks.concat());
    if debug_attr(params.debug.as_deref()) {
        html.push_str(&debug_block(&json!({
            "attempt": attempt,
            "questions": traces,
        })));
    }
    html.push_str("</div>");

    Ok(Html(html))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_id_lists() {
        assert_eq!(question_ids("12, 15 18"), vec![12, 15, 18]);
        assert_eq!(question_ids(" ,x, "), Vec::<i64>::new());
    }
}
