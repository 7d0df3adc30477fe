// src/db/memory.rs

use std::{
    collections::{BTreeMap, HashMap},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::{Duration, Instant},
};

use async_trait::async_trait;

use super::{EssayStore, FormBackend, QuizSettingsStore, QuizStore, course_step_quiz_ids};
use crate::{
    answers::{decode::decode_value, php},
    error::AppError,
    models::{
        attempt::{AnsweredQuestion, Attempt, QuestionDefinition, QuestionRef, QuizPost},
        essay::{ESSAY_STATUSES, EssayQuery, EssaySubmission},
        form::{FormFields, FormSlot},
    },
};

/// A CMS post with its meta rows.
#[derive(Debug, Clone)]
pub struct MemoryPost {
    pub id: i64,
    pub post_type: String,
    pub status: String,
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub meta: Vec<(String, String)>,
}

impl MemoryPost {
    fn meta_value(&self, key: &str) -> Option<&str> {
        self.meta
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn to_essay(&self) -> EssaySubmission {
        let mut meta = BTreeMap::new();
        for (k, v) in &self.meta {
            meta.entry(k.clone()).or_insert_with(|| v.clone());
        }
        EssaySubmission {
            id: self.id,
            author_id: self.author_id,
            content: self.content.clone(),
            meta,
        }
    }
}

/// One row of a quiz-engine settings table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSettingsRow {
    pub id: i64,
    pub statistics_on: bool,
    pub statistics_ip_lock: bool,
}

struct StoredForm {
    /// Serialized exactly as the CMS would store it.
    payload: String,
    expires_at: Option<Instant>,
}

#[derive(Default)]
struct MemoryData {
    attempts: Vec<Attempt>,
    answers: Vec<AnsweredQuestion>,
    questions: Vec<QuestionDefinition>,
    /// Insertion order doubles as publication order.
    posts: Vec<MemoryPost>,
    forms: HashMap<FormSlot, StoredForm>,
    quiz_tables: BTreeMap<String, Vec<QuizSettingsRow>>,
}

/// In-process store with the same semantics as the MySQL tables.
/// Seeded through the `add_*` methods; used by the test suite.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<MemoryData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryData>, AppError> {
        self.data
            .read()
            .map_err(|e| AppError::InternalServerError(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryData>, AppError> {
        self.data
            .write()
            .map_err(|e| AppError::InternalServerError(e.to_string()))
    }

    pub fn add_attempt(&self, attempt: Attempt) -> Result<(), AppError> {
        self.write()?.attempts.push(attempt);
        Ok(())
    }

    pub fn add_answer(&self, answer: AnsweredQuestion) -> Result<(), AppError> {
        self.write()?.answers.push(answer);
        Ok(())
    }

    pub fn add_question(&self, question: QuestionDefinition) -> Result<(), AppError> {
        self.write()?.questions.push(question);
        Ok(())
    }

    /// Adds a post and returns its id.
    pub fn add_post(
        &self,
        post_type: &str,
        title: &str,
        author_id: i64,
        content: &str,
        meta: &[(&str, &str)],
    ) -> Result<i64, AppError> {
        let mut data = self.write()?;
        let id = data.posts.iter().map(|p| p.id).max().unwrap_or(100) + 1;
        data.posts.push(MemoryPost {
            id,
            post_type: post_type.to_string(),
            status: "publish".to_string(),
            author_id,
            title: title.to_string(),
            content: content.to_string(),
            meta: meta
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        Ok(id)
    }

    /// Adds an ungraded essay record and returns its id.
    pub fn add_essay(
        &self,
        author_id: i64,
        content: &str,
        meta: &[(&str, &str)],
    ) -> Result<i64, AppError> {
        let id = self.add_post("sfwd-essays", "Essay", author_id, content, meta)?;
        let mut data = self.write()?;
        if let Some(post) = data.posts.iter_mut().find(|p| p.id == id) {
            post.status = "not_graded".to_string();
        }
        Ok(id)
    }

    pub fn add_quiz_table(&self, name: &str, rows: Vec<QuizSettingsRow>) -> Result<(), AppError> {
        self.write()?.quiz_tables.insert(name.to_string(), rows);
        Ok(())
    }

    pub fn quiz_table(&self, name: &str) -> Result<Option<Vec<QuizSettingsRow>>, AppError> {
        Ok(self.read()?.quiz_tables.get(name).cloned())
    }

    /// Raw stored payload of a form slot, ignoring expiry.
    pub fn stored_form(&self, slot: &FormSlot) -> Result<Option<String>, AppError> {
        Ok(self.read()?.forms.get(slot).map(|f| f.payload.clone()))
    }
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn latest_attempt(
        &self,
        user_id: i64,
        quiz_post_id: i64,
    ) -> Result<Option<Attempt>, AppError> {
        Ok(self
            .read()?
            .attempts
            .iter()
            .filter(|a| a.user_id == user_id && a.quiz_post_id == quiz_post_id)
            .max_by_key(|a| (a.created_at, a.attempt_id))
            .cloned())
    }

    async fn answered_question(
        &self,
        attempt_id: i64,
        question: QuestionRef,
    ) -> Result<Option<AnsweredQuestion>, AppError> {
        Ok(self
            .read()?
            .answers
            .iter()
            .find(|a| {
                a.attempt_id == attempt_id
                    && match question {
                        QuestionRef::Post(id) => a.question_post_id == id,
                        QuestionRef::Engine(id) => a.question_id == id,
                    }
            })
            .cloned())
    }

    async fn attempt_answers(&self, attempt_id: i64) -> Result<Vec<AnsweredQuestion>, AppError> {
        Ok(self
            .read()?
            .answers
            .iter()
            .filter(|a| a.attempt_id == attempt_id)
            .cloned()
            .collect())
    }

    async fn question_definition(
        &self,
        question_id: i64,
    ) -> Result<Option<QuestionDefinition>, AppError> {
        Ok(self
            .read()?
            .questions
            .iter()
            .find(|q| q.question_id == question_id)
            .cloned())
    }

    async fn course_quizzes(&self, course_id: i64) -> Result<Vec<QuizPost>, AppError> {
        let data = self.read()?;
        let course_key = course_id.to_string();
        let quiz_post = |p: &MemoryPost| QuizPost {
            id: p.id,
            title: p.title.clone(),
        };

        let linked: Vec<QuizPost> = data
            .posts
            .iter()
            .filter(|p| p.post_type == "sfwd-quiz" && p.status == "publish")
            .filter(|p| p.meta_value("course_id") == Some(course_key.as_str()))
            .map(quiz_post)
            .collect();
        if !linked.is_empty() {
            return Ok(linked);
        }

        let steps = data
            .posts
            .iter()
            .find(|p| p.id == course_id)
            .and_then(|p| p.meta_value("ld_course_steps"));
        let ids = course_step_quiz_ids(&decode_value(steps));
        Ok(ids
            .iter()
            .filter_map(|id| {
                data.posts
                    .iter()
                    .find(|p| p.id == *id && p.post_type == "sfwd-quiz")
            })
            .map(quiz_post)
            .collect())
    }

    async fn post_title(&self, post_id: i64) -> Result<Option<String>, AppError> {
        Ok(self
            .read()?
            .posts
            .iter()
            .find(|p| p.id == post_id)
            .map(|p| p.title.clone()))
    }
}

#[async_trait]
impl EssayStore for MemoryStore {
    async fn essay_by_id(&self, essay_id: i64) -> Result<Option<EssaySubmission>, AppError> {
        Ok(self
            .read()?
            .posts
            .iter()
            .find(|p| p.id == essay_id && p.post_type == "sfwd-essays")
            .map(MemoryPost::to_essay))
    }

    async fn find_essay(&self, query: &EssayQuery) -> Result<Option<EssaySubmission>, AppError> {
        Ok(self
            .read()?
            .posts
            .iter()
            .rev()
            .filter(|p| p.post_type == "sfwd-essays" && ESSAY_STATUSES.contains(&p.status.as_str()))
            .map(MemoryPost::to_essay)
            .find(|essay| query.matches(essay)))
    }
}

#[async_trait]
impl FormBackend for MemoryStore {
    async fn load_fields(&self, slot: &FormSlot) -> Result<Option<FormFields>, AppError> {
        let data = self.read()?;
        let Some(stored) = data.forms.get(slot) else {
            return Ok(None);
        };
        if stored.expires_at.is_some_and(|at| at <= Instant::now()) {
            return Ok(None);
        }
        Ok(Some(FormFields::from_value(&decode_value(Some(
            &stored.payload,
        )))))
    }

    async fn store_fields(
        &self,
        slot: &FormSlot,
        fields: &FormFields,
        ttl: Option<Duration>,
    ) -> Result<(), AppError> {
        let stored = StoredForm {
            payload: php::serialize(&fields.to_value()),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.write()?.forms.insert(slot.clone(), stored);
        Ok(())
    }
}

#[async_trait]
impl QuizSettingsStore for MemoryStore {
    async fn site_quiz_engine_ids(&self) -> Result<Vec<i64>, AppError> {
        let mut ids: Vec<i64> = self
            .read()?
            .posts
            .iter()
            .filter(|p| p.post_type == "sfwd-quiz")
            .filter_map(|p| p.meta_value("quiz_pro_id"))
            .filter_map(|v| v.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    async fn table_exists(&self, table: &str) -> Result<bool, AppError> {
        Ok(self.read()?.quiz_tables.contains_key(table))
    }

    async fn count_statistics(
        &self,
        table: &str,
        quiz_ids: &[i64],
        enabled: bool,
    ) -> Result<u64, AppError> {
        let data = self.read()?;
        let rows = data
            .quiz_tables
            .get(table)
            .ok_or_else(|| AppError::InternalServerError(format!("Table '{table}' doesn't exist")))?;
        Ok(rows
            .iter()
            .filter(|r| quiz_ids.contains(&r.id) && r.statistics_on == enabled)
            .count() as u64)
    }

    async fn set_statistics(
        &self,
        table: &str,
        quiz_ids: &[i64],
        enabled: bool,
        reset_ip_lock: bool,
    ) -> Result<u64, AppError> {
        let mut data = self.write()?;
        let rows = data
            .quiz_tables
            .get_mut(table)
            .ok_or_else(|| AppError::InternalServerError(format!("Table '{table}' doesn't exist")))?;

        let mut changed = 0;
        for row in rows.iter_mut().filter(|r| quiz_ids.contains(&r.id)) {
            let before = row.clone();
            row.statistics_on = enabled;
            if reset_ip_lock {
                row.statistics_ip_lock = false;
            }
            // Like MySQL, only rows whose values actually change are counted.
            if *row != before {
                changed += 1;
            }
        }
        Ok(changed)
    }
}
