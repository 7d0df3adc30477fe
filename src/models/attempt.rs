// src/models/attempt.rs

use serde::Serialize;
use sqlx::FromRow;

/// One quiz-taking event, read from the quiz engine's `statistic_ref` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Attempt {
    pub attempt_id: i64,
    pub user_id: i64,
    /// Quiz-engine quiz id.
    pub quiz_id: i64,
    /// CMS quiz post id.
    pub quiz_post_id: i64,
    /// Unix timestamp.
    pub created_at: i64,
}

impl Attempt {
    pub fn created_at_utc(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp(self.created_at, 0)
    }
}

/// The recorded response to one question within an attempt (`statistic` table).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnsweredQuestion {
    pub attempt_id: i64,
    /// Quiz-engine question id.
    pub question_id: i64,
    /// CMS question post id.
    pub question_post_id: i64,
    /// Encoded answer blob; its encoding is not recorded anywhere.
    pub raw_answer: Option<String>,
}

/// A question's type and canonical options (`question` table).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuestionDefinition {
    pub question_id: i64,
    /// Question body as stored (may contain markup).
    pub prompt: String,
    pub answer_type: String,
    pub raw_options: Option<String>,
}

/// How an answered question is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionRef {
    /// CMS question post id.
    Post(i64),
    /// Quiz-engine question id.
    Engine(i64),
}

/// A quiz post belonging to a course.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuizPost {
    pub id: i64,
    pub title: String,
}
