// src/handlers/admin.rs

use axum::{
    extract::{Query, State},
    response::Html,
};
use serde::Deserialize;

use crate::{
    error::AppError,
    services::quiz_stats::{NO_QUIZ_IDS, QuizStatsToggle, StatsMode},
    utils::html::escape,
};

#[derive(Debug, Default, Deserialize)]
pub struct QuizStatsParams {
    /// `preview` (default), `on`/`1` or `off`/`0`.
    pub mode: Option<String>,
    /// Present: switching statistics on leaves the IP lock alone.
    pub keep_ip: Option<String>,
}

/// Previews or switches the statistics flag of every quiz on the site.
/// Admin only.
pub async fn quiz_stats(
    State(toggle): State<QuizStatsToggle>,
    Query(params): Query<QuizStatsParams>,
) -> Result<Html<String>, AppError> {
    let mode = StatsMode::parse(params.mode.as_deref().unwrap_or("preview"))?;

    let Some(report) = toggle.run(mode, params.keep_ip.is_some()).await? else {
        return Ok(Html(escape(NO_QUIZ_IDS)));
    };

    let lines: Vec<String> = report.lines.iter().map(|l| escape(l)).collect();
    Ok(Html(lines.join("<br>")))
}
