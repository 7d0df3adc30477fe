// src/services/answers.rs

use serde::Serialize;

use super::{
    attempts::AttemptLookup,
    essays::{EssayMatch, EssayResolver},
};
use crate::{
    answers::{
        AnswerKind, DecodeFormat, DisplayMode, Value, classify, decode, extract_options, render,
    },
    error::AppError,
    models::attempt::{AnsweredQuestion, Attempt, QuestionDefinition, QuestionRef, QuizPost},
    utils::html::strip_tags,
};

/// Intermediate state of one answer, exposed by the debug output.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerTrace {
    pub answer_type: String,
    pub decode_format: DecodeFormat,
    pub decoded: Value,
    pub kind: AnswerKind,
    pub chosen_indices: Vec<i64>,
    pub chosen_texts: Vec<String>,
    pub options: usize,
    pub essay: Option<EssayMatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedAnswer {
    /// Display strings; never empty.
    pub parts: Vec<String>,
    pub trace: AnswerTrace,
}

/// Result of looking up one question's answer for a user.
#[derive(Debug, Clone)]
pub enum AnswerOutcome {
    NoAttempt,
    NotAnswered,
    Answered(RenderedAnswer),
}

/// One answered question inside a course summary.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionAnswer {
    pub question_post_id: i64,
    /// Question text with markup removed.
    pub prompt: String,
    pub answer: RenderedAnswer,
}

/// A quiz the user attempted, with every answered question of the latest attempt.
#[derive(Debug, Clone, Serialize)]
pub struct QuizAnswers {
    pub quiz: QuizPost,
    pub attempt: Attempt,
    pub questions: Vec<QuestionAnswer>,
}

/// Which questions a course summary lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizFilter {
    All,
    /// Free-text questions only.
    Essays,
    None,
}

impl QuizFilter {
    /// `no` hides quizzes, `essays` keeps free-text questions, anything else shows all.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "no" => QuizFilter::None,
            "essays" => QuizFilter::Essays,
            _ => QuizFilter::All,
        }
    }

    fn keeps(self, kind: AnswerKind) -> bool {
        match self {
            QuizFilter::All => true,
            QuizFilter::Essays => kind == AnswerKind::FreeText,
            QuizFilter::None => false,
        }
    }
}

/// Attempt → recorded answer → question definition → decode → classify → render.
#[derive(Clone)]
pub struct AnswerService {
    attempts: AttemptLookup,
    essays: EssayResolver,
}

impl AnswerService {
    pub fn new(attempts: AttemptLookup, essays: EssayResolver) -> Self {
        Self { attempts, essays }
    }

    pub fn attempts(&self) -> &AttemptLookup {
        &self.attempts
    }

    pub fn essays(&self) -> &EssayResolver {
        &self.essays
    }

    /// The user's answer to one question of their latest attempt at a quiz.
    pub async fn question_answer(
        &self,
        user_id: i64,
        quiz_post_id: i64,
        question_post_id: i64,
        mode: DisplayMode,
    ) -> Result<AnswerOutcome, AppError> {
        let Some(attempt) = self
            .attempts
            .find_latest_attempt(user_id, quiz_post_id)
            .await?
        else {
            return Ok(AnswerOutcome::NoAttempt);
        };

        let Some(answered) = self
            .attempts
            .find_answered_question(attempt.attempt_id, QuestionRef::Post(question_post_id))
            .await?
        else {
            return Ok(AnswerOutcome::NotAnswered);
        };

        let definition = self
            .attempts
            .question_definition(answered.question_id)
            .await?;
        let rendered = self
            .render_answered(user_id, quiz_post_id, &answered, definition.as_ref(), mode)
            .await?;
        Ok(AnswerOutcome::Answered(rendered))
    }

    /// Renders a recorded answer. Free-text answers with no recoverable text
    /// are looked up in the essay records.
    pub async fn render_answered(
        &self,
        user_id: i64,
        quiz_post_id: i64,
        answered: &AnsweredQuestion,
        definition: Option<&QuestionDefinition>,
        mode: DisplayMode,
    ) -> Result<RenderedAnswer, AppError> {
        let raw = answered.raw_answer.as_deref().unwrap_or_default();
        let decoded = decode(answered.raw_answer.as_deref());
        let answer_type = definition.map(|d| d.answer_type.as_str()).unwrap_or_default();
        let options = extract_options(definition.and_then(|d| d.raw_options.as_deref()));

        let mut classification = classify(
            answer_type,
            &decoded.value,
            decoded.raw_fallback(raw),
            &options,
        );

        let mut essay = None;
        if classification.needs_essay_lookup() {
            tracing::debug!(
                question_post_id = answered.question_post_id,
                "no answer text recorded, trying essay records"
            );
            essay = self
                .essays
                .resolve_essay_text(
                    user_id,
                    quiz_post_id,
                    answered.question_post_id,
                    Some(answered),
                )
                .await?;
            if let Some(found) = &essay {
                classification.chosen_texts.push(found.text.clone());
            }
        }

        let parts = render(
            classification.kind,
            &options,
            &classification.chosen_indices,
            &classification.chosen_texts,
            mode,
        );

        Ok(RenderedAnswer {
            parts,
            trace: AnswerTrace {
                answer_type: answer_type.to_string(),
                decode_format: decoded.format,
                decoded: decoded.value,
                kind: classification.kind,
                chosen_indices: classification.chosen_indices,
                chosen_texts: classification.chosen_texts,
                options: options.len(),
                essay,
            },
        })
    }

    /// Every attempted quiz of a course with the answers of its latest attempt.
    /// Quizzes without an attempt, or with nothing left after filtering, are omitted.
    pub async fn course_answers(
        &self,
        user_id: i64,
        course_id: i64,
        filter: QuizFilter,
    ) -> Result<Vec<QuizAnswers>, AppError> {
        if filter == QuizFilter::None {
            return Ok(Vec::new());
        }

        let mut result = Vec::new();
        for quiz in self.attempts.course_quizzes(course_id).await? {
            let Some(attempt) = self.attempts.find_latest_attempt(user_id, quiz.id).await? else {
                continue;
            };

            let mut questions = Vec::new();
            for answered in self.attempts.attempt_answers(attempt.attempt_id).await? {
                let definition = self
                    .attempts
                    .question_definition(answered.question_id)
                    .await?;
                let kind = AnswerKind::from_answer_type(
                    definition
                        .as_ref()
                        .map(|d| d.answer_type.as_str())
                        .unwrap_or_default(),
                );
                if !filter.keeps(kind) {
                    continue;
                }

                let answer = self
                    .render_answered(
                        user_id,
                        quiz.id,
                        &answered,
                        definition.as_ref(),
                        DisplayMode::Selected,
                    )
                    .await?;
                questions.push(QuestionAnswer {
                    question_post_id: answered.question_post_id,
                    prompt: definition
                        .as_ref()
                        .map(|d| strip_tags(&d.prompt))
                        .unwrap_or_default(),
                    answer,
                });
            }

            if !questions.is_empty() {
                result.push(QuizAnswers {
                    quiz,
                    attempt,
                    questions,
                });
            }
        }
        Ok(result)
    }
}
