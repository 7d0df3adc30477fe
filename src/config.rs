// src/config.rs

use std::{env, time::Duration};
use dotenvy::dotenv;

/// Which entry points are mounted. Mirrors the host plugin's settings page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub quiz_answers: bool,
    pub essay_answers: bool,
    pub otter_forms: bool,
    pub quiz_stats: bool,
    pub course_summary: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            quiz_answers: true,
            essay_answers: true,
            otter_forms: true,
            quiz_stats: true,
            course_summary: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: String,
    /// Site table prefix, e.g. `wp_` or `wp_2_` on a multisite network.
    pub table_prefix: String,
    /// Network-wide table prefix.
    pub base_prefix: String,
    pub guest_cookie: String,
    pub guest_latest_ttl: Duration,
    pub guest_cookie_max_age: Duration,
    pub features: Features,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        // Prefixes are spliced into SQL, so only identifier characters are accepted.
        let table_prefix = env::var("TABLE_PREFIX").unwrap_or_else(|_| "wp_".to_string());
        assert!(
            is_table_prefix(&table_prefix),
            "TABLE_PREFIX may only contain letters, digits and underscores"
        );
        let base_prefix = env::var("BASE_PREFIX").unwrap_or_else(|_| table_prefix.clone());
        assert!(
            is_table_prefix(&base_prefix),
            "BASE_PREFIX may only contain letters, digits and underscores"
        );

        let guest_cookie = env::var("GUEST_COOKIE")
            .unwrap_or_else(|_| "aotter_sid".to_string());

        let features = Features {
            quiz_answers: env_flag("ENABLE_QUIZ_ANSWERS"),
            essay_answers: env_flag("ENABLE_ESSAY_ANSWERS"),
            otter_forms: env_flag("ENABLE_OTTER_FORMS"),
            quiz_stats: env_flag("ENABLE_QUIZ_STATS"),
            course_summary: env_flag("ENABLE_COURSE_SUMMARY"),
        };

        Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr,
            table_prefix,
            base_prefix,
            guest_cookie,
            guest_latest_ttl: env_secs("GUEST_LATEST_TTL_SECS", 24 * 60 * 60),
            guest_cookie_max_age: env_secs("GUEST_COOKIE_MAX_AGE_SECS", 365 * 24 * 60 * 60),
            features,
        }
    }
}

fn is_table_prefix(prefix: &str) -> bool {
    !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Feature toggles default to on; `0`, `false`, `no` and `off` disable them.
fn env_flag(name: &str) -> bool {
    match env::var(name) {
        Ok(v) => !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"),
        Err(_) => true,
    }
}

fn env_secs(name: &str, default: u64) -> Duration {
    let secs = env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default);
    Duration::from_secs(secs)
}
