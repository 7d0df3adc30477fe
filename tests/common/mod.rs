// tests/common/mod.rs

#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use course_toolkit::{
    config::{Config, Features},
    db::memory::MemoryStore,
    routes,
    state::AppState,
    utils::jwt::sign_jwt,
};

pub const JWT_SECRET: &str = "test_secret_for_integration_tests";

pub struct TestApp {
    pub address: String,
    pub store: Arc<MemoryStore>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// GET returning the body text; panics on transport errors.
    pub async fn get_html(&self, path: &str, token: Option<&str>) -> String {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request
            .send()
            .await
            .expect("Failed to execute request")
            .text()
            .await
            .expect("Failed to read body")
    }
}

pub fn test_config(features: Features) -> Config {
    Config {
        database_url: String::new(),
        jwt_secret: JWT_SECRET.to_string(),
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        table_prefix: "wp_".to_string(),
        base_prefix: "wp_".to_string(),
        guest_cookie: "aotter_sid".to_string(),
        guest_latest_ttl: Duration::from_secs(24 * 60 * 60),
        guest_cookie_max_age: Duration::from_secs(60 * 60),
        features,
    }
}

/// Spawns the app over an empty in-memory store on a random port.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(Features::default()).await
}

pub async fn spawn_app_with(features: Features) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store.clone(), test_config(features));
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        store,
        client: reqwest::Client::new(),
    }
}

pub fn token_for(user_id: i64, role: &str) -> String {
    sign_jwt(user_id, role, JWT_SECRET, 600).expect("Failed to sign token")
}
