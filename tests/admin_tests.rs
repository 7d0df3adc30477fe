// tests/admin_tests.rs

mod common;

use common::{TestApp, spawn_app, token_for};
use course_toolkit::db::memory::QuizSettingsRow;

const TABLE: &str = "wp_wp_pro_quiz_quiz";

fn row(id: i64, on: bool) -> QuizSettingsRow {
    QuizSettingsRow {
        id,
        statistics_on: on,
        statistics_ip_lock: true,
    }
}

fn seed(app: &TestApp) {
    app.store
        .add_post("sfwd-quiz", "Quiz A", 1, "", &[("quiz_pro_id", "4")])
        .unwrap();
    app.store
        .add_post("sfwd-quiz", "Quiz B", 1, "", &[("quiz_pro_id", "5")])
        .unwrap();
    app.store
        .add_quiz_table(TABLE, vec![row(4, false), row(5, false), row(6, false)])
        .unwrap();
}

async fn stats(app: &TestApp, query: &str, token: Option<&str>) -> reqwest::Response {
    let mut request = app.client.get(app.url(&format!("/api/admin/quiz-stats{query}")));
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    request.send().await.expect("Failed to execute request")
}

#[tokio::test]
async fn admin_routes_require_an_administrator() {
    let app = spawn_app().await;
    seed(&app);

    let anonymous = stats(&app, "", None).await;
    assert_eq!(anonymous.status().as_u16(), 401);

    let forged = stats(&app, "", Some("forged.token.value")).await;
    assert_eq!(forged.status().as_u16(), 401);

    let subscriber = stats(&app, "", Some(&token_for(2, "subscriber"))).await;
    assert_eq!(subscriber.status().as_u16(), 403);

    let admin = stats(&app, "", Some(&token_for(1, "administrator"))).await;
    assert_eq!(admin.status().as_u16(), 200);
}

#[tokio::test]
async fn preview_reports_without_changing_anything() {
    let app = spawn_app().await;
    seed(&app);
    let token = token_for(1, "administrator");

    let first = stats(&app, "?mode=preview", Some(&token)).await.text().await.unwrap();
    let second = stats(&app, "", Some(&token)).await.text().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first,
        "wp_wp_pro_quiz_quiz: quizzes=2 → ON=0, OFF=2<br>wp_pro_quiz_quiz: not found (skipped)"
    );

    let rows = app.store.quiz_table(TABLE).unwrap().unwrap();
    assert!(rows.iter().all(|r| !r.statistics_on));
}

#[tokio::test]
async fn switching_statistics_on_and_off() {
    let app = spawn_app().await;
    seed(&app);
    let token = token_for(1, "admin");

    let on = stats(&app, "?mode=on&keep_ip=1", Some(&token)).await.text().await.unwrap();
    assert!(on.starts_with("wp_wp_pro_quiz_quiz: rows affected=2<br>"));

    let rows = app.store.quiz_table(TABLE).unwrap().unwrap();
    assert_eq!(rows[0], QuizSettingsRow { id: 4, statistics_on: true, statistics_ip_lock: true });
    assert_eq!(rows[2], row(6, false));

    let preview = stats(&app, "", Some(&token)).await.text().await.unwrap();
    assert!(preview.contains("quizzes=2 → ON=2, OFF=0"));

    let off = stats(&app, "?mode=0", Some(&token)).await.text().await.unwrap();
    assert!(off.starts_with("wp_wp_pro_quiz_quiz: rows affected=2"));
}

#[tokio::test]
async fn unknown_modes_and_empty_sites() {
    let app = spawn_app().await;
    let token = token_for(1, "administrator");

    let empty = stats(&app, "", Some(&token)).await.text().await.unwrap();
    assert_eq!(empty, "No quiz_pro_id found on this site.");

    seed(&app);
    let bad = stats(&app, "?mode=toggle", Some(&token)).await;
    assert_eq!(bad.status().as_u16(), 400);
}
