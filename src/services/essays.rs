// src/services/essays.rs

use std::sync::Arc;

use serde::Serialize;

use crate::{
    answers::{Value, decode},
    db::EssayStore,
    error::AppError,
    models::{
        attempt::AnsweredQuestion,
        essay::{EssayQuery, EssaySubmission, MetaClause},
    },
};

/// Keys under which a decoded answer may point at its essay record.
const ESSAY_ID_KEYS: [&str; 4] = ["graded_id", "essay_post_id", "post_id", "essay_id"];
const QUIZ_KEYS: [&str; 4] = ["quiz_id", "ld_quiz_id", "ld_essay_quiz", "quiz_post_id"];
const QUESTION_KEYS: [&str; 3] = ["question_id", "question_post_id", "ld_essay_question_id"];
const ENGINE_QUESTION_KEYS: [&str; 2] = ["question_pro_id", "question_id"];

/// Which lookup found the essay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EssayStage {
    /// Record referenced by id from the recorded answer.
    LinkedRecord,
    /// Search by quiz and question meta.
    QuizAndQuestion,
    /// Search by the quiz-engine question id.
    EngineQuestion,
}

#[derive(Debug, Clone, Serialize)]
pub struct EssayMatch {
    pub essay_id: i64,
    pub stage: EssayStage,
    pub text: String,
}

/// Finds the essay text a user submitted for a question.
#[derive(Clone)]
pub struct EssayResolver {
    store: Arc<dyn EssayStore>,
}

impl EssayResolver {
    pub fn new(store: Arc<dyn EssayStore>) -> Self {
        Self { store }
    }

    /// Tries, in order, the record linked from the recorded answer, a search by
    /// quiz and question, and a search by the engine question id. A stage runs
    /// only if the previous ones found no non-empty text.
    pub async fn resolve_essay_text(
        &self,
        user_id: i64,
        quiz_post_id: i64,
        question_post_id: i64,
        answered: Option<&AnsweredQuestion>,
    ) -> Result<Option<EssayMatch>, AppError> {
        let linked = answered.and_then(|a| linked_essay_id(&decode(a.raw_answer.as_deref()).value));
        if let Some(essay_id) = linked {
            match self.store.essay_by_id(essay_id).await? {
                Some(essay) if essay.belongs_to(user_id) => {
                    if let Some(found) = non_empty(essay, EssayStage::LinkedRecord) {
                        return Ok(Some(found));
                    }
                }
                Some(_) => {
                    tracing::debug!(essay_id, user_id, "linked essay belongs to another user")
                }
                None => tracing::debug!(essay_id, "linked essay record missing"),
            }
        }

        let by_quiz = EssayQuery {
            author_id: user_id,
            clauses: vec![
                MetaClause::new(&QUIZ_KEYS, quiz_post_id),
                MetaClause::new(&QUESTION_KEYS, question_post_id),
            ],
        };
        if let Some(found) = self.search(&by_quiz, EssayStage::QuizAndQuestion).await? {
            return Ok(Some(found));
        }

        let Some(answered) = answered else {
            return Ok(None);
        };
        let by_engine_id = EssayQuery {
            author_id: user_id,
            clauses: vec![MetaClause::new(&ENGINE_QUESTION_KEYS, answered.question_id)],
        };
        self.search(&by_engine_id, EssayStage::EngineQuestion).await
    }

    async fn search(
        &self,
        query: &EssayQuery,
        stage: EssayStage,
    ) -> Result<Option<EssayMatch>, AppError> {
        let found = self.store.find_essay(query).await?;
        if found.is_none() {
            tracing::debug!(?stage, "no essay record matched");
        }
        Ok(found.and_then(|essay| non_empty(essay, stage)))
    }
}

fn non_empty(essay: EssaySubmission, stage: EssayStage) -> Option<EssayMatch> {
    let text = essay.text();
    (!text.is_empty()).then_some(EssayMatch {
        essay_id: essay.id,
        stage,
        text,
    })
}

/// Essay record id referenced by a decoded answer: one of the id keys of a
/// map, or the whole answer when it is a bare number.
fn linked_essay_id(decoded: &Value) -> Option<i64> {
    let id = if decoded.is_array() {
        ESSAY_ID_KEYS.iter().find_map(|key| {
            decoded
                .get(key)
                .filter(|v| v.truthy() && v.is_numeric())
                .and_then(Value::as_index)
        })
    } else if decoded.is_numeric() {
        decoded.as_index()
    } else {
        None
    };
    id.filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;

    fn answered(raw: &str) -> AnsweredQuestion {
        AnsweredQuestion {
            attempt_id: 1,
            question_id: 77,
            question_post_id: 20,
            raw_answer: Some(raw.to_string()),
        }
    }

    #[test]
    fn essay_ids_from_answer_shapes() {
        let map = decode(Some(r#"{"graded_id":"42"}"#)).value;
        assert_eq!(linked_essay_id(&map), Some(42));
        assert_eq!(linked_essay_id(&Value::Int(9)), Some(9));
        assert_eq!(linked_essay_id(&Value::Text(" 15 ".into())), Some(15));
        assert_eq!(linked_essay_id(&Value::Text("just text".into())), None);
        assert_eq!(linked_essay_id(&decode(Some(r#"{"graded_id":0,"post_id":5}"#)).value), Some(5));
    }

    #[tokio::test]
    async fn linked_record_is_preferred() {
        let store = Arc::new(MemoryStore::new());
        let id = store.add_essay(5, "<p>Linked</p>", &[]).unwrap();
        store
            .add_essay(5, "Searched", &[("quiz_id", "10"), ("question_post_id", "20")])
            .unwrap();
        let resolver = EssayResolver::new(store);

        let found = resolver
            .resolve_essay_text(5, 10, 20, Some(&answered(&format!("{{\"graded_id\":{id}}}"))))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.stage, EssayStage::LinkedRecord);
        assert_eq!(found.text, "Linked");
    }

    #[tokio::test]
    async fn foreign_essays_are_never_returned() {
        let store = Arc::new(MemoryStore::new());
        let other = store
            .add_essay(6, "Not yours", &[("quiz_id", "10"), ("question_post_id", "20")])
            .unwrap();
        let resolver = EssayResolver::new(store);

        let found = resolver
            .resolve_essay_text(5, 10, 20, Some(&answered(&other.to_string())))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn falls_back_to_meta_searches() {
        let store = Arc::new(MemoryStore::new());
        store
            .add_essay(
                5,
                "",
                &[
                    ("ld_quiz_id", "10"),
                    ("ld_essay_question_id", "20"),
                    ("essay_answer", "From meta"),
                ],
            )
            .unwrap();
        store.add_essay(5, "By engine id", &[("question_pro_id", "77")]).unwrap();
        let resolver = EssayResolver::new(store);

        let by_quiz = resolver.resolve_essay_text(5, 10, 20, None).await.unwrap().unwrap();
        assert_eq!(by_quiz.stage, EssayStage::QuizAndQuestion);
        assert_eq!(by_quiz.text, "From meta");

        let by_engine = resolver
            .resolve_essay_text(5, 11, 21, Some(&answered("free text")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_engine.stage, EssayStage::EngineQuestion);
        assert_eq!(by_engine.text, "By engine id");

        assert!(resolver.resolve_essay_text(5, 11, 21, None).await.unwrap().is_none());
    }
}
