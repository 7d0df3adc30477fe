// src/services/quiz_stats.rs

use std::sync::Arc;

use serde::Serialize;

use crate::{db::QuizSettingsStore, error::AppError};

pub const NO_QUIZ_IDS: &str = "No quiz_pro_id found on this site.";

/// What the statistics toggle does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsMode {
    /// Count current on/off states without changing anything.
    Preview,
    On,
    Off,
}

impl StatsMode {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "preview" => Ok(StatsMode::Preview),
            "on" | "1" => Ok(StatsMode::On),
            "off" | "0" => Ok(StatsMode::Off),
            other => Err(AppError::BadRequest(format!(
                "Unknown mode '{other}', expected preview, on or off"
            ))),
        }
    }
}

/// Per-table outcome lines of one toggle run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsReport {
    pub quiz_ids: Vec<i64>,
    pub lines: Vec<String>,
}

/// Bulk preview or switch of the quiz engine's "statistics enabled" flag for
/// every quiz on the site.
#[derive(Clone)]
pub struct QuizStatsToggle {
    store: Arc<dyn QuizSettingsStore>,
    candidate_tables: Vec<String>,
}

impl QuizStatsToggle {
    /// The settings table name depends on the install, so every known
    /// spelling under both the site and the network prefix is tried.
    pub fn new(store: Arc<dyn QuizSettingsStore>, prefix: &str, base_prefix: &str) -> Self {
        let mut candidate_tables: Vec<String> = Vec::new();
        for table in [
            format!("{prefix}wp_pro_quiz_quiz"),
            format!("{prefix}pro_quiz_quiz"),
            format!("{base_prefix}wp_pro_quiz_quiz"),
            format!("{base_prefix}pro_quiz_quiz"),
        ] {
            if !candidate_tables.contains(&table) {
                candidate_tables.push(table);
            }
        }
        Self {
            store,
            candidate_tables,
        }
    }

    pub fn candidate_tables(&self) -> &[String] {
        &self.candidate_tables
    }

    /// Runs the toggle. Returns `Ok(None)` when the site has no quiz-engine ids.
    /// A missing or failing table is reported in its line and skipped.
    pub async fn run(
        &self,
        mode: StatsMode,
        keep_ip_lock: bool,
    ) -> Result<Option<StatsReport>, AppError> {
        let quiz_ids = self.store.site_quiz_engine_ids().await?;
        if quiz_ids.is_empty() {
            return Ok(None);
        }

        let mut lines = Vec::with_capacity(self.candidate_tables.len());
        for table in &self.candidate_tables {
            if !self.store.table_exists(table).await? {
                tracing::warn!(table = %table, "quiz settings table not found, skipped");
                lines.push(format!("{table}: not found (skipped)"));
                continue;
            }

            let line = match self.apply(table, &quiz_ids, mode, keep_ip_lock).await {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!(table = %table, error = %e, "statistics toggle failed");
                    format!("{table}: failed (skipped)")
                }
            };
            lines.push(line);
        }

        tracing::info!(?mode, quizzes = quiz_ids.len(), "statistics toggle finished");
        Ok(Some(StatsReport { quiz_ids, lines }))
    }

    async fn apply(
        &self,
        table: &str,
        quiz_ids: &[i64],
        mode: StatsMode,
        keep_ip_lock: bool,
    ) -> Result<String, AppError> {
        match mode {
            StatsMode::Preview => {
                let on = self.store.count_statistics(table, quiz_ids, true).await?;
                let off = self.store.count_statistics(table, quiz_ids, false).await?;
                Ok(format!(
                    "{table}: quizzes={} → ON={on}, OFF={off}",
                    quiz_ids.len()
                ))
            }
            StatsMode::On | StatsMode::Off => {
                let enable = mode == StatsMode::On;
                let reset_ip_lock = enable && !keep_ip_lock;
                let affected = self
                    .store
                    .set_statistics(table, quiz_ids, enable, reset_ip_lock)
                    .await?;
                Ok(format!("{table}: rows affected={affected}"))
            }
        }
    }
}
