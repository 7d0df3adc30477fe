// src/db/mod.rs

//! Storage ports. The quiz engine, essay records and CMS meta tables are owned
//! by the host; these traits are the only way the services reach them.

pub mod memory;
pub mod mysql;

use std::time::Duration;

use async_trait::async_trait;

use crate::{
    answers::Value,
    error::AppError,
    models::{
        attempt::{AnsweredQuestion, Attempt, QuestionDefinition, QuestionRef, QuizPost},
        essay::{EssayQuery, EssaySubmission},
        form::{FormFields, FormSlot},
    },
};

/// Read access to quiz attempts, recorded answers and question definitions.
#[async_trait]
pub trait QuizStore: Send + Sync {
    /// Newest attempt by creation time, ties broken by the higher attempt id.
    async fn latest_attempt(
        &self,
        user_id: i64,
        quiz_post_id: i64,
    ) -> Result<Option<Attempt>, AppError>;

    /// First recorded answer for the question within the attempt.
    async fn answered_question(
        &self,
        attempt_id: i64,
        question: QuestionRef,
    ) -> Result<Option<AnsweredQuestion>, AppError>;

    /// Every recorded answer of an attempt, in question order.
    async fn attempt_answers(&self, attempt_id: i64) -> Result<Vec<AnsweredQuestion>, AppError>;

    async fn question_definition(
        &self,
        question_id: i64,
    ) -> Result<Option<QuestionDefinition>, AppError>;

    /// Quiz posts that belong to a course.
    async fn course_quizzes(&self, course_id: i64) -> Result<Vec<QuizPost>, AppError>;

    async fn post_title(&self, post_id: i64) -> Result<Option<String>, AppError>;
}

/// Read access to essay records.
#[async_trait]
pub trait EssayStore: Send + Sync {
    async fn essay_by_id(&self, essay_id: i64) -> Result<Option<EssaySubmission>, AppError>;

    /// Newest essay matching the query.
    async fn find_essay(&self, query: &EssayQuery) -> Result<Option<EssaySubmission>, AppError>;
}

/// Persistence for captured form fields.
#[async_trait]
pub trait FormBackend: Send + Sync {
    /// Stored mapping, or `None` if nothing was stored or it has expired.
    async fn load_fields(&self, slot: &FormSlot) -> Result<Option<FormFields>, AppError>;

    /// Replaces the stored mapping. With `ttl` the entry expires after that long.
    async fn store_fields(
        &self,
        slot: &FormSlot,
        fields: &FormFields,
        ttl: Option<Duration>,
    ) -> Result<(), AppError>;
}

/// The quiz engine's per-quiz settings rows, used by the statistics toggle.
#[async_trait]
pub trait QuizSettingsStore: Send + Sync {
    /// Quiz-engine ids referenced by the site's quiz posts.
    async fn site_quiz_engine_ids(&self) -> Result<Vec<i64>, AppError>;

    async fn table_exists(&self, table: &str) -> Result<bool, AppError>;

    /// Number of the given quizzes whose statistics flag equals `enabled`.
    async fn count_statistics(
        &self,
        table: &str,
        quiz_ids: &[i64],
        enabled: bool,
    ) -> Result<u64, AppError>;

    /// Sets the statistics flag; `reset_ip_lock` also clears the IP lock.
    /// Returns the number of rows changed.
    async fn set_statistics(
        &self,
        table: &str,
        quiz_ids: &[i64],
        enabled: bool,
        reset_ip_lock: bool,
    ) -> Result<u64, AppError>;
}

/// Quiz post ids listed in a course's serialized step structure.
///
/// Older installs store `{"sfwd-quiz": [ids]}`; newer ones nest the same map
/// under `steps.h` and key it by id.
pub(crate) fn course_step_quiz_ids(steps: &Value) -> Vec<i64> {
    let quizzes = steps.get_set("sfwd-quiz").or_else(|| {
        steps
            .get_set("steps")
            .and_then(|s| s.get_set("h"))
            .and_then(|h| h.get_set("sfwd-quiz"))
    });

    let Some(quizzes) = quizzes else {
        return Vec::new();
    };
    match quizzes {
        Value::Map(entries) => entries
            .iter()
            .filter_map(|(k, v)| k.parse::<i64>().ok().or_else(|| v.as_index()))
            .filter(|id| *id > 0)
            .collect(),
        other => other
            .array_values()
            .into_iter()
            .filter_map(Value::as_index)
            .filter(|id| *id > 0)
            .collect(),
    }
}
