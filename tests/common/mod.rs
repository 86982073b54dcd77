#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use bloodline::config::{Config, ResetConfig, ResetDelivery};
use bloodline::reset::Clock;
use bloodline::state::SharedState;

pub const ADMIN_EMAIL: &str = "admin@bloodline.test";
pub const ADMIN_PASSWORD: &str = "adminpass123";

/// Clock the tests move by hand.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// A running test server instance with a dedicated test database.
pub struct TestApp {
    pub addr: SocketAddr,
    pub pool: PgPool,
    pub client: Client,
    pub db_name: String,
    pub clock: Arc<ManualClock>,
    pub state: SharedState,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn send_json(&self, req: reqwest::RequestBuilder) -> (Value, StatusCode) {
        let resp = req.send().await.expect("request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn register(&self, email: &str, password: &str, role: &str) -> (Value, StatusCode) {
        let req = self.client.post(self.url("/api/auth/register")).json(&json!({
            "fullName": format!("{role} User"),
            "email": email,
            "phone": "555-0100",
            "password": password,
            "role": role,
            "bloodType": "O+",
            "location": "Singapore",
        }));
        self.send_json(req).await
    }

    pub async fn login(&self, email: &str, password: &str) -> (Value, StatusCode) {
        let req = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password }));
        self.send_json(req).await
    }

    /// Register the first account as Admin and return its access token.
    pub async fn bootstrap_admin(&self) -> String {
        let (body, status) = self.register(ADMIN_EMAIL, ADMIN_PASSWORD, "Admin").await;
        assert_eq!(status, StatusCode::OK, "admin register failed: {body}");
        self.token_for(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    pub async fn token_for(&self, email: &str, password: &str) -> String {
        let (body, status) = self.login(email, password).await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["accessToken"].as_str().unwrap().to_string()
    }

    /// Register a donor and return its user id.
    pub async fn register_donor(&self, email: &str, password: &str) -> i64 {
        let (body, status) = self.register(email, password, "Donor").await;
        assert_eq!(status, StatusCode::OK, "donor register failed: {body}");
        body["user"]["id"].as_i64().unwrap()
    }

    pub async fn forgot_password(&self, email: &str) -> (Value, StatusCode) {
        let req = self
            .client
            .post(self.url("/api/auth/forgot-password"))
            .json(&json!({ "email": email }));
        self.send_json(req).await
    }

    /// Request a reset and return the echoed code.
    pub async fn issue_code(&self, email: &str) -> String {
        let (body, status) = self.forgot_password(email).await;
        assert_eq!(status, StatusCode::OK, "forgot-password failed: {body}");
        body["token"].as_str().expect("token echoed").to_string()
    }

    pub async fn reset_password(
        &self,
        email: &str,
        token: &str,
        new_password: &str,
    ) -> (Value, StatusCode) {
        let req = self
            .client
            .post(self.url("/api/auth/reset-password"))
            .json(&json!({ "email": email, "token": token, "newPassword": new_password }));
        self.send_json(req).await
    }

    pub async fn get_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let req = self.client.get(self.url(path)).bearer_auth(token);
        self.send_json(req).await
    }

    pub async fn put_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let req = self.client.put(self.url(path)).bearer_auth(token).json(body);
        self.send_json(req).await
    }

    pub async fn count_reset_rows(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM password_reset_tokens")
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}

pub fn test_config(database_url: String) -> Config {
    Config {
        database_url,
        jwt_secret: "test-jwt-secret-that-is-long-enough".to_string(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        environment: "test".to_string(),
        max_body_size: 65_536,
        cors_origins: vec!["http://localhost:3000".to_string()],
        log_level: "warn".to_string(),
        reset: ResetConfig::default(),
        smtp: None,
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with_delivery(delivery: ResetDelivery) -> TestApp {
    spawn_app_with(|config| config.reset.delivery = delivery).await
}

/// Spawn a test app with a fresh temporary database.
pub async fn spawn_app_with(customize: impl FnOnce(&mut Config)) -> TestApp {
    let _ = dotenvy::dotenv();

    let base_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for tests");

    let db_name = format!("bloodline_test_{}", Uuid::now_v7().simple());

    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
        .expect("Failed to connect to postgres for test DB creation");

    sqlx::query(&format!("CREATE DATABASE \"{db_name}\""))
        .execute(&admin_pool)
        .await
        .expect("Failed to create test database");

    admin_pool.close().await;

    let test_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/{db_name}"))
        .unwrap_or_else(|| base_url.clone());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&test_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations on test database");

    let mut config = test_config(test_url);
    customize(&mut config);

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let (app, state) = bloodline::build_app_with(pool.clone(), config, clock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        addr,
        pool,
        client,
        db_name,
        clock,
        state,
    }
}

/// Drop the test database after tests complete.
pub async fn cleanup(app: TestApp) {
    let db_name = app.db_name.clone();
    app.pool.close().await;

    let base_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for tests");
    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
        .expect("Failed to connect for cleanup");

    let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE)"))
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;
}
