// src/handlers/course.rs

use axum::{
    extract::{Query, State},
    response::Html,
};
use serde::Deserialize;
use serde_json::json;

use super::{debug_attr, int_attr};
use crate::{
    answers::AnswerKind,
    error::AppError,
    models::form::{FormFields, Identity},
    services::answers::{QuizAnswers, QuizFilter},
    state::AppState,
    utils::{
        html::{debug_block, escape, escape_multiline},
        jwt::MaybeViewer,
    },
};

#[derive(Debug, Default, Deserialize)]
pub struct CourseSummaryParams {
    pub course_id: Option<String>,
    /// Anything but `no` shows the form section.
    pub show_forms: Option<String>,
    /// `all`/`yes` (default), `essays` or `no`.
    pub show_quizzes: Option<String>,
    pub debug: Option<String>,
}

/// One page with the viewer's latest form responses and their answers to
/// every attempted quiz of a course.
pub async fn course_summary(
    State(state): State<AppState>,
    MaybeViewer(viewer): MaybeViewer,
    Query(params): Query<CourseSummaryParams>,
) -> Result<Html<String>, AppError> {
    let course_id = int_attr(params.course_id.as_deref());
    if course_id <= 0 {
        return Ok(Html(
            "<div class=\"ldct-error\"><strong>Error:</strong> course_id is required</div>"
                .to_string(),
        ));
    }

    let Some(viewer) = viewer else {
        return Ok(Html(
            "<div class=\"ldct-notice\">Please log in to view your course summary.</div>"
                .to_string(),
        ));
    };

    let show_forms = !params
        .show_forms
        .as_deref()
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("no"));
    let filter = QuizFilter::parse(params.show_quizzes.as_deref().unwrap_or("all"));

    let quizzes = state
        .answers
        .course_answers(viewer.user_id, course_id, filter)
        .await?;
    let forms = if show_forms {
        state.forms.read_latest(&Identity::User(viewer.user_id)).await?
    } else {
        FormFields::new()
    };

    let course_title = state
        .answers
        .attempts()
        .post_title(course_id)
        .await?
        .unwrap_or_else(|| format!("Course #{course_id}"));

    let mut html = vec![
        "<div class=\"ldct-course-summary\">".to_string(),
        format!(
            "<div class=\"ldct-header\"><h2>{}</h2><p>Your Course Summary</p></div>",
            escape(&course_title)
        ),
    ];

    if !forms.is_empty() {
        html.push(forms_section(&forms));
    }
    if !quizzes.is_empty() {
        html.push(quizzes_section(&quizzes));
    }
    if quizzes.is_empty() && forms.is_empty() {
        html.push(
            "<div class=\"ldct-empty\"><p>No quiz attempts or form responses found yet.</p><p>Complete quizzes and submit forms to see your summary here.</p></div>"
                .to_string(),
        );
    }

    if debug_attr(params.debug.as_deref()) {
        html.push(debug_block(&json!({
            "course_id": course_id,
            "show_quizzes": filter,
            "quiz_count": quizzes.len(),
            "form_field_count": forms.len(),
            "quizzes": quizzes,
        })));
    }

    html.push("</div>".to_string());
    Ok(Html(html.join("\n")))
}

fn forms_section(forms: &FormFields) -> String {
    let rows: String = forms
        .iter()
        .map(|(field, value)| {
            format!(
                "<dt>{}:</dt><dd>{}</dd>",
                escape(field),
                escape(&value.display())
            )
        })
        .collect();
    format!(
        "<div class=\"ldct-forms-section\"><h3>Your Responses</h3><dl class=\"ldct-forms-list\">{rows}</dl></div>"
    )
}

fn quizzes_section(quizzes: &[QuizAnswers]) -> String {
    let mut out = String::from("<div class=\"ldct-quizzes-section\"><h3>Quiz Answers</h3>");
    for quiz in quizzes {
        let completed = quiz
            .attempt
            .created_at_utc()
            .map(|at| at.format("%B %-d, %Y %-I:%M %P").to_string())
            .unwrap_or_default();
        out.push_str(&format!(
            "<div class=\"ldct-quiz\"><div class=\"ldct-quiz-header\"><h4>{}</h4><p>Completed: {}</p></div><div class=\"ldct-questions\">",
            escape(&quiz.quiz.title),
            escape(&completed)
        ));

        for question in &quiz.questions {
            let joined = question.answer.parts.join(" | ");
            let answer = if question.answer.trace.kind == AnswerKind::FreeText {
                escape_multiline(&joined)
            } else {
                escape(&joined)
            };
            out.push_str(&format!(
                "<div class=\"ldct-question\"><div class=\"ldct-question-text\">{}</div><div class=\"ldct-answer-text\">{}</div></div>",
                escape(&question.prompt),
                answer
            ));
        }
        out.push_str("</div></div>");
    }
    out.push_str("</div>");
    out
}
