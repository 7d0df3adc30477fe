// src/models/essay.rs

use std::collections::BTreeMap;

use serde::Serialize;

use crate::utils::html::strip_tags;

/// Meta keys that may hold the essay body when the post content is empty.
pub const ANSWER_META_KEYS: [&str; 4] = ["essay", "essay_answer", "ld_essay_answer", "answer"];

/// Post statuses an essay record can be in, graded or not.
pub const ESSAY_STATUSES: [&str; 6] = ["publish", "pending", "draft", "private", "graded", "not_graded"];

/// A free-text essay record (`sfwd-essays` post) with the meta fields that link
/// it to a quiz and question.
#[derive(Debug, Clone, Serialize)]
pub struct EssaySubmission {
    pub id: i64,
    pub author_id: i64,
    pub content: String,
    pub meta: BTreeMap<String, String>,
}

impl EssaySubmission {
    /// Plain text of the essay: the stripped post content, else the first
    /// non-empty answer meta field.
    pub fn text(&self) -> String {
        let body = strip_tags(&self.content);
        if !body.is_empty() {
            return body;
        }

        ANSWER_META_KEYS
            .iter()
            .filter_map(|key| self.meta.get(*key))
            .map(|v| strip_tags(v))
            .find(|v| !v.is_empty())
            .unwrap_or_default()
    }

    /// Whether `user_id` may read this essay: they wrote it, or the record's
    /// `user_id` meta names them.
    pub fn belongs_to(&self, user_id: i64) -> bool {
        if self.author_id == user_id {
            return true;
        }
        self.meta
            .get("user_id")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .is_some_and(|owner| owner == user_id)
    }
}

/// One OR-group of a meta search: any of `keys` equal to `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetaClause {
    pub keys: Vec<&'static str>,
    pub value: String,
}

impl MetaClause {
    pub fn new(keys: &[&'static str], value: impl ToString) -> Self {
        Self {
            keys: keys.to_vec(),
            value: value.to_string(),
        }
    }
}

/// Essay search: records by `author_id` satisfying every clause, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EssayQuery {
    pub author_id: i64,
    pub clauses: Vec<MetaClause>,
}

impl EssayQuery {
    pub fn matches(&self, essay: &EssaySubmission) -> bool {
        essay.author_id == self.author_id
            && self.clauses.iter().all(|clause| {
                clause
                    .keys
                    .iter()
                    .any(|key| essay.meta.get(*key).is_some_and(|v| *v == clause.value))
            })
    }
}
