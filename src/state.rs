// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    db::{EssayStore, FormBackend, QuizSettingsStore, QuizStore},
    services::{
        answers::AnswerService, attempts::AttemptLookup, essays::EssayResolver, forms::FormStore,
        quiz_stats::QuizStatsToggle,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub answers: AnswerService,
    pub forms: FormStore,
    pub quiz_stats: QuizStatsToggle,
    pub config: Config,
}

impl AppState {
    /// Wires every service to a single backend implementing all storage ports.
    pub fn new<B>(backend: Arc<B>, config: Config) -> Self
    where
        B: QuizStore + EssayStore + FormBackend + QuizSettingsStore + 'static,
    {
        let attempts = AttemptLookup::new(backend.clone());
        let essays = EssayResolver::new(backend.clone());
        Self {
            answers: AnswerService::new(attempts, essays),
            forms: FormStore::new(backend.clone(), config.guest_latest_ttl),
            quiz_stats: QuizStatsToggle::new(backend, &config.table_prefix, &config.base_prefix),
            config,
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for AnswerService {
    fn from_ref(state: &AppState) -> Self {
        state.answers.clone()
    }
}

impl FromRef<AppState> for FormStore {
    fn from_ref(state: &AppState) -> Self {
        state.forms.clone()
    }
}

impl FromRef<AppState> for QuizStatsToggle {
    fn from_ref(state: &AppState) -> Self {
        state.quiz_stats.clone()
    }
}
