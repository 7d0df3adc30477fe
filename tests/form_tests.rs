// tests/form_tests.rs

mod common;

use common::{TestApp, spawn_app, token_for};
use reqwest::header::{COOKIE, SET_COOKIE};
use serde_json::{Value, json};

async fn save(
    app: &TestApp,
    body: Value,
    token: Option<&str>,
    cookie: Option<&str>,
) -> reqwest::Response {
    let mut request = app.client.post(app.url("/api/forms/save")).json(&body);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    if let Some(cookie) = cookie {
        request = request.header(COOKIE, cookie);
    }
    request.send().await.expect("Failed to execute request")
}

async fn get_with_cookie(app: &TestApp, path: &str, cookie: &str) -> String {
    app.client
        .get(app.url(path))
        .header(COOKIE, cookie)
        .send()
        .await
        .expect("Failed to execute request")
        .text()
        .await
        .expect("Failed to read body")
}

/// `name=value` part of the session cookie set by a response.
fn session_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("aotter_sid="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

#[tokio::test]
async fn user_saves_merge_per_page() {
    let app = spawn_app().await;
    let token = token_for(7, "subscriber");

    let first = save(
        &app,
        json!({ "page_id": 12, "fields": { "<b>Name</b>:": " Ada  Lovelace ", "Colors": ["red", "", "blue"] } }),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(first.status().as_u16(), 200);
    assert!(session_cookie(&first).is_none());
    let body: Value = first.json().await.expect("Failed to parse JSON");
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["mode"], "user");
    assert_eq!(body["data"]["page_id"], 12);
    assert_eq!(body["data"]["count"], 2);

    let second = save(
        &app,
        json!({ "page_id": 12, "fields": { "Name": "Ada King", "Agree *": true } }),
        Some(&token),
        None,
    )
    .await;
    let body: Value = second.json().await.expect("Failed to parse JSON");
    assert_eq!(body["data"]["count"], 3);

    let name = app
        .get_html("/api/forms/field?field=Name", Some(&token))
        .await;
    assert_eq!(name, "Ada King");

    let colors = app
        .get_html("/api/forms/page?field=Colors&page_id=12", Some(&token))
        .await;
    assert_eq!(colors, "red, blue");

    let agree = app.get_html("/api/forms/field?field=Agree", Some(&token)).await;
    assert_eq!(agree, "1");
}

#[tokio::test]
async fn latest_view_spans_pages() {
    let app = spawn_app().await;
    let token = token_for(8, "subscriber");

    save(&app, json!({ "page_id": 1, "fields": { "City": "Oslo" } }), Some(&token), None).await;
    save(&app, json!({ "page_id": 2, "fields": { "City": "Bergen", "Zip": "5003" } }), Some(&token), None).await;

    assert_eq!(app.get_html("/api/forms/field?field=City", Some(&token)).await, "Bergen");
    assert_eq!(
        app.get_html("/api/forms/page?field=City&page_id=1", Some(&token)).await,
        "Oslo"
    );
    assert_eq!(
        app.get_html("/api/forms/page?field=Zip&page_id=1&fallback=none", Some(&token))
            .await,
        "none"
    );

    let list = app.get_html("/api/forms/latest", Some(&token)).await;
    assert_eq!(
        list,
        "<dl class=\"aotter-list\"><dt><strong>City</strong></dt><dd>Bergen</dd><dt><strong>Zip</strong></dt><dd>5003</dd></dl>"
    );

    let dump = app.get_html("/api/forms/dump?page_id=1", Some(&token)).await;
    assert!(dump.starts_with("<pre"));
    assert!(dump.contains("&quot;logged_in&quot;: true"));
    assert!(dump.contains("&quot;user_id&quot;: 8"));
    assert!(dump.contains("&quot;City&quot;: &quot;Oslo&quot;"));
}

#[tokio::test]
async fn guests_get_a_session_cookie() {
    let app = spawn_app().await;

    let first = save(&app, json!({ "page_id": 3, "fields": { "Email": "g@x.io" } }), None, None).await;
    assert_eq!(first.status().as_u16(), 200);
    let cookie = session_cookie(&first).expect("guest session cookie");
    let token = cookie.trim_start_matches("aotter_sid=");
    assert_eq!(token.len(), 32);
    assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));

    let body: Value = first.json().await.expect("Failed to parse JSON");
    assert_eq!(body["data"]["mode"], "guest");
    assert_eq!(body["data"]["count"], 1);

    // The returning guest keeps their session and their fields.
    let second = save(
        &app,
        json!({ "page_id": 4, "fields": { "Phone": "555" } }),
        None,
        Some(&cookie),
    )
    .await;
    assert!(session_cookie(&second).is_none());
    let body: Value = second.json().await.expect("Failed to parse JSON");
    assert_eq!(body["data"]["count"], 2);

    assert_eq!(get_with_cookie(&app, "/api/forms/field?field=Email", &cookie).await, "g@x.io");
    assert_eq!(
        get_with_cookie(&app, "/api/forms/page?field=Phone&page_id=4", &cookie).await,
        "555"
    );

    // Another reader sees nothing.
    assert_eq!(app.get_html("/api/forms/field?field=Email&fallback=-", None).await, "-");
    assert_eq!(app.get_html("/api/forms/latest", None).await, "");

    let dump = get_with_cookie(&app, "/api/forms/dump", &cookie).await;
    assert!(dump.contains("&quot;logged_in&quot;: false"));
}

#[tokio::test]
async fn malformed_session_cookie_is_replaced() {
    let app = spawn_app().await;

    let response = save(
        &app,
        json!({ "page_id": 1, "fields": { "Name": "Guest" } }),
        None,
        Some("aotter_sid=short"),
    )
    .await;
    assert_eq!(response.status().as_u16(), 200);
    let cookie = session_cookie(&response).expect("replacement cookie");
    assert_ne!(cookie, "aotter_sid=short");

    assert_eq!(get_with_cookie(&app, "/api/forms/field?field=Name", &cookie).await, "Guest");
}

#[tokio::test]
async fn oversized_submissions_are_rejected() {
    let app = spawn_app().await;
    let token = token_for(9, "subscriber");

    let fields: serde_json::Map<String, Value> = (0..201)
        .map(|i| (format!("field{i}"), json!("x")))
        .collect();
    let response = save(&app, json!({ "page_id": 1, "fields": fields }), Some(&token), None).await;
    assert_eq!(response.status().as_u16(), 400);

    let negative = save(&app, json!({ "page_id": -1, "fields": {} }), Some(&token), None).await;
    assert_eq!(negative.status().as_u16(), 400);

    assert_eq!(app.get_html("/api/forms/latest", Some(&token)).await, "");
}
