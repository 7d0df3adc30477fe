// src/db/mysql.rs

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{FromRow, MySql, MySqlPool, QueryBuilder};

use super::{EssayStore, FormBackend, QuizSettingsStore, QuizStore, course_step_quiz_ids};
use crate::{
    answers::{decode::decode_value, php},
    error::AppError,
    models::{
        attempt::{AnsweredQuestion, Attempt, QuestionDefinition, QuestionRef, QuizPost},
        essay::{ESSAY_STATUSES, EssayQuery, EssaySubmission},
        form::{FormFields, FormSlot, Identity},
    },
};

/// Reads the host's WordPress/LearnDash tables directly.
///
/// Table names are built from the configured prefix, which `Config` restricts
/// to `[A-Za-z0-9_]`; every value is bound as a parameter.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
    prefix: String,
}

#[derive(FromRow)]
struct EssayRow {
    id: i64,
    author_id: i64,
    content: Option<String>,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool, prefix: impl Into<String>) -> Self {
        Self {
            pool,
            prefix: prefix.into(),
        }
    }

    fn table(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn quiz_table(&self, name: &str) -> String {
        self.table(&format!("learndash_pro_quiz_{name}"))
    }

    async fn essay_with_meta(&self, row: EssayRow) -> Result<EssaySubmission, AppError> {
        let sql = format!(
            "SELECT meta_key, meta_value FROM {} WHERE post_id = ? ORDER BY meta_id ASC",
            self.table("postmeta")
        );
        let meta: Vec<(Option<String>, Option<String>)> = sqlx::query_as(&sql)
            .bind(row.id)
            .fetch_all(&self.pool)
            .await?;

        let mut essay = EssaySubmission {
            id: row.id,
            author_id: row.author_id,
            content: row.content.unwrap_or_default(),
            meta: Default::default(),
        };
        for (key, value) in meta {
            if let (Some(key), Some(value)) = (key, value) {
                // First value wins, like a single-value meta read.
                essay.meta.entry(key).or_insert(value);
            }
        }
        Ok(essay)
    }

    async fn quiz_posts_by_ids(&self, ids: &[i64]) -> Result<Vec<QuizPost>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = QueryBuilder::<MySql>::new(format!(
            "SELECT CAST(ID AS SIGNED) AS id, post_title AS title FROM {} \
             WHERE post_type = 'sfwd-quiz' AND ID IN (",
            self.table("posts")
        ));
        let mut separated = builder.separated(",");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let mut posts: Vec<QuizPost> = builder.build_query_as().fetch_all(&self.pool).await?;
        posts.sort_by_key(|p| ids.iter().position(|id| *id == p.id));
        Ok(posts)
    }

    async fn user_meta(&self, user_id: i64, key: &str) -> Result<Option<String>, AppError> {
        let sql = format!(
            "SELECT meta_value FROM {} WHERE user_id = ? AND meta_key = ? ORDER BY umeta_id ASC LIMIT 1",
            self.table("usermeta")
        );
        let value: Option<Option<String>> = sqlx::query_scalar(&sql)
            .bind(user_id)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.flatten())
    }

    async fn put_user_meta(&self, user_id: i64, key: &str, value: &str) -> Result<(), AppError> {
        let table = self.table("usermeta");
        let existing: Option<i64> = sqlx::query_scalar(&format!(
            "SELECT CAST(umeta_id AS SIGNED) FROM {table} WHERE user_id = ? AND meta_key = ? ORDER BY umeta_id ASC LIMIT 1"
        ))
        .bind(user_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        match existing {
            Some(umeta_id) => {
                sqlx::query(&format!("UPDATE {table} SET meta_value = ? WHERE umeta_id = ?"))
                    .bind(value)
                    .bind(umeta_id)
                    .execute(&self.pool)
                    .await?;
            }
            None => {
                sqlx::query(&format!(
                    "INSERT INTO {table} (user_id, meta_key, meta_value) VALUES (?, ?, ?)"
                ))
                .bind(user_id)
                .bind(key)
                .bind(value)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    /// Newest guest entry post for (session, page).
    async fn guest_entry_id(&self, sid: &str, page_id: i64) -> Result<Option<i64>, AppError> {
        let sql = format!(
            "SELECT CAST(p.ID AS SIGNED) FROM {posts} p \
             JOIN {meta} s ON s.post_id = p.ID AND s.meta_key = '_aotter_sid' AND s.meta_value = ? \
             JOIN {meta} pg ON pg.post_id = p.ID AND pg.meta_key = '_aotter_page' AND pg.meta_value = ? \
             WHERE p.post_type = 'aotter_entry' AND p.post_status = 'publish' \
             ORDER BY p.ID DESC LIMIT 1",
            posts = self.table("posts"),
            meta = self.table("postmeta"),
        );
        Ok(sqlx::query_scalar(&sql)
            .bind(sid)
            .bind(page_id.to_string())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn post_meta(&self, post_id: i64, key: &str) -> Result<Option<String>, AppError> {
        let sql = format!(
            "SELECT meta_value FROM {} WHERE post_id = ? AND meta_key = ? ORDER BY meta_id ASC LIMIT 1",
            self.table("postmeta")
        );
        let value: Option<Option<String>> = sqlx::query_scalar(&sql)
            .bind(post_id)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.flatten())
    }

    async fn store_guest_page(
        &self,
        sid: &str,
        page_id: i64,
        payload: &str,
    ) -> Result<(), AppError> {
        let posts = self.table("posts");
        let meta = self.table("postmeta");

        if let Some(post_id) = self.guest_entry_id(sid, page_id).await? {
            let updated = sqlx::query(&format!(
                "UPDATE {meta} SET meta_value = ? WHERE post_id = ? AND meta_key = '_aotter_fields'"
            ))
            .bind(payload)
            .bind(post_id)
            .execute(&self.pool)
            .await?;
            if updated.rows_affected() == 0 && self.post_meta(post_id, "_aotter_fields").await?.is_none() {
                sqlx::query(&format!(
                    "INSERT INTO {meta} (post_id, meta_key, meta_value) VALUES (?, '_aotter_fields', ?)"
                ))
                .bind(post_id)
                .bind(payload)
                .execute(&self.pool)
                .await?;
            }
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        let title = format!("AOTTER {}", &uuid::Uuid::new_v4().simple().to_string()[..6]);
        let inserted = sqlx::query(&format!(
            "INSERT INTO {posts} (post_author, post_date, post_date_gmt, post_content, post_title, post_excerpt, \
             post_status, post_name, to_ping, pinged, post_modified, post_modified_gmt, post_content_filtered, post_type) \
             VALUES (0, NOW(), UTC_TIMESTAMP(), '', ?, '', 'publish', '', '', '', NOW(), UTC_TIMESTAMP(), '', 'aotter_entry')"
        ))
        .bind(&title)
        .execute(&mut *tx)
        .await?;
        let post_id = inserted.last_insert_id() as i64;

        for (key, value) in [
            ("_aotter_sid", sid.to_string()),
            ("_aotter_page", page_id.to_string()),
            ("_aotter_fields", payload.to_string()),
        ] {
            sqlx::query(&format!(
                "INSERT INTO {meta} (post_id, meta_key, meta_value) VALUES (?, ?, ?)"
            ))
            .bind(post_id)
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn option_value(&self, name: &str) -> Result<Option<String>, AppError> {
        let sql = format!(
            "SELECT option_value FROM {} WHERE option_name = ? LIMIT 1",
            self.table("options")
        );
        Ok(sqlx::query_scalar(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn put_option(&self, name: &str, value: &str) -> Result<(), AppError> {
        let sql = format!(
            "INSERT INTO {} (option_name, option_value, autoload) VALUES (?, ?, 'no') \
             ON DUPLICATE KEY UPDATE option_value = VALUES(option_value)",
            self.table("options")
        );
        sqlx::query(&sql)
            .bind(name)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Transient read: `None` once the timeout option has passed.
    async fn transient(&self, key: &str) -> Result<Option<String>, AppError> {
        if let Some(timeout) = self.option_value(&format!("_transient_timeout_{key}")).await? {
            let expires_at = timeout.trim().parse::<i64>().unwrap_or(0);
            if expires_at < chrono::Utc::now().timestamp() {
                return Ok(None);
            }
        }
        self.option_value(&format!("_transient_{key}")).await
    }

    async fn set_transient(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), AppError> {
        if let Some(ttl) = ttl {
            let expires_at = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
            self.put_option(&format!("_transient_timeout_{key}"), &expires_at.to_string())
                .await?;
        }
        self.put_option(&format!("_transient_{key}"), value).await
    }
}

fn parse_fields(stored: Option<String>) -> Option<FormFields> {
    stored.map(|raw| FormFields::from_value(&decode_value(Some(&raw))))
}

fn user_page_key(page_id: i64) -> String {
    format!("aotter_answers_{page_id}")
}

const USER_LATEST_KEY: &str = "aotter_latest_fields";

fn guest_latest_key(sid: &str) -> String {
    format!("aotter_latest_{sid}")
}

#[async_trait]
impl QuizStore for MySqlStore {
    async fn latest_attempt(
        &self,
        user_id: i64,
        quiz_post_id: i64,
    ) -> Result<Option<Attempt>, AppError> {
        let sql = format!(
            "SELECT CAST(statistic_ref_id AS SIGNED) AS attempt_id, CAST(user_id AS SIGNED) AS user_id, \
             CAST(quiz_id AS SIGNED) AS quiz_id, CAST(quiz_post_id AS SIGNED) AS quiz_post_id, \
             CAST(create_time AS SIGNED) AS created_at \
             FROM {} WHERE user_id = ? AND quiz_post_id = ? \
             ORDER BY create_time DESC, statistic_ref_id DESC LIMIT 1",
            self.quiz_table("statistic_ref")
        );
        sqlx::query_as::<_, Attempt>(&sql)
            .bind(user_id)
            .bind(quiz_post_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch latest attempt: {:?}", e);
                AppError::from(e)
            })
    }

    async fn answered_question(
        &self,
        attempt_id: i64,
        question: QuestionRef,
    ) -> Result<Option<AnsweredQuestion>, AppError> {
        let (column, id) = match question {
            QuestionRef::Post(id) => ("question_post_id", id),
            QuestionRef::Engine(id) => ("question_id", id),
        };
        let sql = format!(
            "SELECT CAST(statistic_ref_id AS SIGNED) AS attempt_id, CAST(question_id AS SIGNED) AS question_id, \
             CAST(question_post_id AS SIGNED) AS question_post_id, answer_data AS raw_answer \
             FROM {} WHERE statistic_ref_id = ? AND {column} = ? LIMIT 1",
            self.quiz_table("statistic")
        );
        Ok(sqlx::query_as::<_, AnsweredQuestion>(&sql)
            .bind(attempt_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn attempt_answers(&self, attempt_id: i64) -> Result<Vec<AnsweredQuestion>, AppError> {
        // Quiz order on purpose, not recording order (statistic_id).
        let sql = format!(
            "SELECT CAST(s.statistic_ref_id AS SIGNED) AS attempt_id, CAST(s.question_id AS SIGNED) AS question_id, \
             CAST(s.question_post_id AS SIGNED) AS question_post_id, s.answer_data AS raw_answer \
             FROM {stat} s LEFT JOIN {question} q ON q.id = s.question_id \
             WHERE s.statistic_ref_id = ? \
             ORDER BY COALESCE(q.sort, 0) ASC, s.question_id ASC",
            stat = self.quiz_table("statistic"),
            question = self.quiz_table("question"),
        );
        Ok(sqlx::query_as::<_, AnsweredQuestion>(&sql)
            .bind(attempt_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn question_definition(
        &self,
        question_id: i64,
    ) -> Result<Option<QuestionDefinition>, AppError> {
        let sql = format!(
            "SELECT CAST(id AS SIGNED) AS question_id, COALESCE(question, '') AS prompt, \
             COALESCE(answer_type, '') AS answer_type, answer_data AS raw_options \
             FROM {} WHERE id = ? LIMIT 1",
            self.quiz_table("question")
        );
        Ok(sqlx::query_as::<_, QuestionDefinition>(&sql)
            .bind(question_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn course_quizzes(&self, course_id: i64) -> Result<Vec<QuizPost>, AppError> {
        let sql = format!(
            "SELECT CAST(p.ID AS SIGNED) AS id, p.post_title AS title FROM {posts} p \
             JOIN {meta} pm ON pm.post_id = p.ID \
             WHERE p.post_type = 'sfwd-quiz' AND p.post_status = 'publish' \
             AND pm.meta_key = 'course_id' AND pm.meta_value = ? \
             ORDER BY p.menu_order ASC, p.ID ASC",
            posts = self.table("posts"),
            meta = self.table("postmeta"),
        );
        let quizzes: Vec<QuizPost> = sqlx::query_as(&sql)
            .bind(course_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        if !quizzes.is_empty() {
            return Ok(quizzes);
        }

        let steps = self.post_meta(course_id, "ld_course_steps").await?;
        let ids = course_step_quiz_ids(&decode_value(steps.as_deref()));
        self.quiz_posts_by_ids(&ids).await
    }

    async fn post_title(&self, post_id: i64) -> Result<Option<String>, AppError> {
        let sql = format!("SELECT post_title FROM {} WHERE ID = ?", self.table("posts"));
        Ok(sqlx::query_scalar(&sql)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await?)
    }
}

#[async_trait]
impl EssayStore for MySqlStore {
    async fn essay_by_id(&self, essay_id: i64) -> Result<Option<EssaySubmission>, AppError> {
        let sql = format!(
            "SELECT CAST(ID AS SIGNED) AS id, CAST(post_author AS SIGNED) AS author_id, post_content AS content \
             FROM {} WHERE ID = ? AND post_type = 'sfwd-essays'",
            self.table("posts")
        );
        let row: Option<EssayRow> = sqlx::query_as(&sql)
            .bind(essay_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.essay_with_meta(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_essay(&self, query: &EssayQuery) -> Result<Option<EssaySubmission>, AppError> {
        let posts = self.table("posts");
        let meta = self.table("postmeta");

        let mut builder = QueryBuilder::<MySql>::new(format!(
            "SELECT CAST(p.ID AS SIGNED) AS id, CAST(p.post_author AS SIGNED) AS author_id, \
             p.post_content AS content FROM {posts} p \
             WHERE p.post_type = 'sfwd-essays' AND p.post_author = "
        ));
        builder.push_bind(query.author_id);

        builder.push(" AND p.post_status IN (");
        let mut statuses = builder.separated(",");
        for status in ESSAY_STATUSES {
            statuses.push_bind(status);
        }
        statuses.push_unseparated(")");

        for clause in &query.clauses {
            builder.push(format!(
                " AND EXISTS (SELECT 1 FROM {meta} pm WHERE pm.post_id = p.ID AND pm.meta_key IN ("
            ));
            let mut keys = builder.separated(",");
            for key in &clause.keys {
                keys.push_bind(*key);
            }
            keys.push_unseparated(") AND pm.meta_value = ");
            builder.push_bind(clause.value.clone());
            builder.push(")");
        }
        builder.push(" ORDER BY p.post_date DESC, p.ID DESC LIMIT 1");

        let row: Option<EssayRow> = builder
            .build_query_as()
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.essay_with_meta(row).await?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl FormBackend for MySqlStore {
    async fn load_fields(&self, slot: &FormSlot) -> Result<Option<FormFields>, AppError> {
        let stored = match slot {
            FormSlot::Page {
                identity: Identity::User(user_id),
                page_id,
            } => self.user_meta(*user_id, &user_page_key(*page_id)).await?,
            FormSlot::Latest {
                identity: Identity::User(user_id),
            } => self.user_meta(*user_id, USER_LATEST_KEY).await?,
            FormSlot::Page {
                identity: Identity::Guest(sid),
                page_id,
            } => match self.guest_entry_id(sid, *page_id).await? {
                Some(post_id) => self.post_meta(post_id, "_aotter_fields").await?,
                None => None,
            },
            FormSlot::Latest {
                identity: Identity::Guest(sid),
            } => self.transient(&guest_latest_key(sid)).await?,
        };
        Ok(parse_fields(stored))
    }

    async fn store_fields(
        &self,
        slot: &FormSlot,
        fields: &FormFields,
        ttl: Option<Duration>,
    ) -> Result<(), AppError> {
        let payload = php::serialize(&fields.to_value());
        match slot {
            FormSlot::Page {
                identity: Identity::User(user_id),
                page_id,
            } => self.put_user_meta(*user_id, &user_page_key(*page_id), &payload).await,
            FormSlot::Latest {
                identity: Identity::User(user_id),
            } => self.put_user_meta(*user_id, USER_LATEST_KEY, &payload).await,
            FormSlot::Page {
                identity: Identity::Guest(sid),
                page_id,
            } => self.store_guest_page(sid, *page_id, &payload).await,
            FormSlot::Latest {
                identity: Identity::Guest(sid),
            } => self.set_transient(&guest_latest_key(sid), &payload, ttl).await,
        }
    }
}

#[async_trait]
impl QuizSettingsStore for MySqlStore {
    async fn site_quiz_engine_ids(&self) -> Result<Vec<i64>, AppError> {
        let sql = format!(
            "SELECT DISTINCT CAST(pm.meta_value AS SIGNED) FROM {meta} pm \
             JOIN {posts} p ON p.ID = pm.post_id \
             WHERE p.post_type = 'sfwd-quiz' AND pm.meta_key = 'quiz_pro_id' AND pm.meta_value <> ''",
            meta = self.table("postmeta"),
            posts = self.table("posts"),
        );
        let ids: Vec<Option<i64>> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;
        let mut ids: Vec<i64> = ids.into_iter().flatten().filter(|id| *id > 0).collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    async fn table_exists(&self, table: &str) -> Result<bool, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = DATABASE() AND table_name = ?",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn count_statistics(
        &self,
        table: &str,
        quiz_ids: &[i64],
        enabled: bool,
    ) -> Result<u64, AppError> {
        let mut builder = QueryBuilder::<MySql>::new(format!(
            "SELECT COUNT(*) FROM {table} WHERE statistics_on = "
        ));
        builder.push_bind(i32::from(enabled));
        push_id_filter(&mut builder, quiz_ids);

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn set_statistics(
        &self,
        table: &str,
        quiz_ids: &[i64],
        enabled: bool,
        reset_ip_lock: bool,
    ) -> Result<u64, AppError> {
        let mut builder = QueryBuilder::<MySql>::new(format!("UPDATE {table} SET statistics_on = "));
        builder.push_bind(i32::from(enabled));
        if reset_ip_lock {
            builder.push(", statistics_ip_lock = 0");
        }
        builder.push(" WHERE 1 = 1");
        push_id_filter(&mut builder, quiz_ids);

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

fn push_id_filter(builder: &mut QueryBuilder<'_, MySql>, ids: &[i64]) {
    builder.push(" AND id IN (");
    let mut separated = builder.separated(",");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}
