// tests/common/mod.rs

#![allow(dead_code)]

use std::str::FromStr;
use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde_json::{Value, json};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use studyplan::{
    config::{Config, RateLimitConfig},
    handlers::admin::seed_admin_user,
    routes,
    state::AppState,
};

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-password";

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        admin_email: Some(ADMIN_EMAIL.to_string()),
        admin_password: Some(ADMIN_PASSWORD.to_string()),
        cookie_secure: false,
        cors_origins: vec!["http://localhost:3000".to_string()],
        rate_limit: RateLimitConfig {
            window: Duration::from_secs(60),
            max_requests: 10_000,
            capacity: 10_000,
        },
    }
}

/// Spawns the app on a random port over a fresh in-memory database.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
pub async fn spawn_app() -> String {
    spawn_app_with(test_config()).await
}

pub async fn spawn_app_with(config: Config) -> String {
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .expect("valid sqlite url")
        .foreign_keys(true);

    // One connection that never recycles: the in-memory database lives as long as it does.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("Failed to open in-memory SQLite");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    seed_admin_user(&pool, &config)
        .await
        .expect("Failed to seed admin user");

    let app = routes::create_router(AppState::new(pool, config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://127.0.0.1:{}", port)
}

/// A signed-in client. Requests carry the bearer token and the CSRF pair.
pub struct Session {
    pub address: String,
    pub client: reqwest::Client,
    pub token: String,
    pub csrf: String,
    pub id: String,
}

impl Session {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    fn with_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(&self.token)
            .header("cookie", format!("csrf_token={}", self.csrf))
            .header("x-csrf-token", &self.csrf)
    }

    pub async fn get(&self, path: &str) -> Response {
        self.with_auth(self.client.get(self.url(path)))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post(&self, path: &str, body: Value) -> Response {
        self.with_auth(self.client.post(self.url(path)).json(&body))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn put(&self, path: &str, body: Value) -> Response {
        self.with_auth(self.client.put(self.url(path)).json(&body))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete(&self, path: &str) -> Response {
        self.with_auth(self.client.delete(self.url(path)))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// POST and assert 201, returning the body.
    pub async fn create(&self, path: &str, body: Value) -> Value {
        let response = self.post(path, body).await;
        let status = response.status();
        let body: Value = response.json().await.expect("json body");
        assert_eq!(status, StatusCode::CREATED, "POST {} -> {}", path, body);
        body
    }

    /// GET and assert 200, returning the body.
    pub async fn fetch(&self, path: &str) -> Value {
        let response = self.get(path).await;
        let status = response.status();
        let body: Value = response.json().await.expect("json body");
        assert_eq!(status, StatusCode::OK, "GET {} -> {}", path, body);
        body
    }
}

pub fn unique_email(prefix: &str) -> String {
    format!("{}_{}@example.com", prefix, &uuid::Uuid::new_v4().to_string()[..8])
}

async fn login(address: &str, path: &str, email: &str, password: &str) -> (String, String, Value) {
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}{}", address, path))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::OK, "login failed");

    let body: Value = response.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();
    let csrf = body["csrfToken"].as_str().unwrap().to_string();
    (token, csrf, body)
}

/// Registers a fresh teacher and signs in.
pub async fn teacher_session(address: &str) -> Session {
    let email = unique_email("teacher");
    let password = "password123";

    let response = reqwest::Client::new()
        .post(format!("{}/api/auth/register", address))
        .json(&json!({ "name": "Ayşe Öğretmen", "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let (token, csrf, body) = login(address, "/api/auth/login", &email, password).await;
    Session {
        address: address.to_string(),
        client: reqwest::Client::new(),
        token,
        csrf,
        id: body["user"]["id"].as_str().unwrap().to_string(),
    }
}

/// Signs in as the admin seeded by `spawn_app`.
pub async fn admin_session(address: &str) -> Session {
    let (token, csrf, body) = login(address, "/api/auth/login", ADMIN_EMAIL, ADMIN_PASSWORD).await;
    Session {
        address: address.to_string(),
        client: reqwest::Client::new(),
        token,
        csrf,
        id: body["user"]["id"].as_str().unwrap().to_string(),
    }
}

/// Signs in as a student created by `teacher` with the given credentials.
pub async fn student_session(address: &str, email: &str, password: &str) -> Session {
    let (token, csrf, body) = login(address, "/api/auth/student-login", email, password).await;
    Session {
        address: address.to_string(),
        client: reqwest::Client::new(),
        token,
        csrf,
        id: body["student"]["id"].as_str().unwrap().to_string(),
    }
}

pub fn id_of(value: &Value) -> String {
    value["id"].as_str().expect("id field").to_string()
}

/// Creates a lesson with the given topic names, returning (lesson id, topic ids).
pub async fn lesson_with_topics(session: &Session, name: &str, topics: &[&str]) -> (String, Vec<String>) {
    let lesson = session
        .create(
            "/api/lessons",
            json!({ "name": name, "groupLabel": "Sayısal", "examType": "TYT" }),
        )
        .await;
    let lesson_id = id_of(&lesson);

    let mut topic_ids = Vec::new();
    for topic in topics {
        let created = session
            .create(
                &format!("/api/lessons/{}/topics", lesson_id),
                json!({ "name": topic }),
            )
            .await;
        topic_ids.push(id_of(&created));
    }
    (lesson_id, topic_ids)
}
