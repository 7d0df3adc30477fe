// src/services/attempts.rs

use std::sync::Arc;

use crate::{
    db::QuizStore,
    error::AppError,
    models::attempt::{AnsweredQuestion, Attempt, QuestionDefinition, QuestionRef, QuizPost},
};

/// Resolves a user's current attempt and the answers recorded in it.
#[derive(Clone)]
pub struct AttemptLookup {
    store: Arc<dyn QuizStore>,
}

impl AttemptLookup {
    pub fn new(store: Arc<dyn QuizStore>) -> Self {
        Self { store }
    }

    /// The most recent attempt of `user_id` at the quiz post, if any.
    pub async fn find_latest_attempt(
        &self,
        user_id: i64,
        quiz_post_id: i64,
    ) -> Result<Option<Attempt>, AppError> {
        let attempt = self.store.latest_attempt(user_id, quiz_post_id).await?;
        if attempt.is_none() {
            tracing::debug!(user_id, quiz_post_id, "no attempt recorded");
        }
        Ok(attempt)
    }

    pub async fn find_answered_question(
        &self,
        attempt_id: i64,
        question: QuestionRef,
    ) -> Result<Option<AnsweredQuestion>, AppError> {
        let answer = self.store.answered_question(attempt_id, question).await?;
        if answer.is_none() {
            tracing::debug!(attempt_id, ?question, "question not answered in attempt");
        }
        Ok(answer)
    }

    pub async fn attempt_answers(
        &self,
        attempt_id: i64,
    ) -> Result<Vec<AnsweredQuestion>, AppError> {
        self.store.attempt_answers(attempt_id).await
    }

    pub async fn question_definition(
        &self,
        question_id: i64,
    ) -> Result<Option<QuestionDefinition>, AppError> {
        self.store.question_definition(question_id).await
    }

    pub async fn course_quizzes(&self, course_id: i64) -> Result<Vec<QuizPost>, AppError> {
        self.store.course_quizzes(course_id).await
    }

    pub async fn post_title(&self, post_id: i64) -> Result<Option<String>, AppError> {
        self.store.post_title(post_id).await
    }
}
