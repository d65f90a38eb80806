//! Common test utilities for E2E tests

#![allow(dead_code)]

use rustcircle::{AppState, config};
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const TEST_SESSION_SECRET: &str = "test-secret-key-32-bytes-long!!!";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

/// An actor known to the server, with a valid bearer token
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: String,
    pub token: String,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server after adjusting the default test configuration
    pub async fn with_config(adjust: impl FnOnce(&mut config::AppConfig)) -> Self {
        rustcircle::metrics::init_metrics();

        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let mut config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                domain: "test.example.com".to_string(),
                protocol: "https".to_string(),
            },
            database: config::DatabaseConfig { path: db_path },
            auth: config::AuthConfig {
                session_secret: TEST_SESSION_SECRET.to_string(),
                session_max_age: 604800,
            },
            relationships: config::RelationshipConfig::default(),
            pagination: config::PaginationConfig::default(),
            notifications: config::NotificationConfig::default(),
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };
        adjust(&mut config);

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = rustcircle::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Issue a session token the way the credential service does
    pub fn token_for(&self, user_id: &str, username: &str) -> String {
        use rustcircle::auth::session::{Session, create_session_token};

        let session = Session::new(
            user_id,
            username,
            Some(format!("Test {username}")),
            3600,
        );
        create_session_token(&session, &self.state.config.auth.session_secret)
            .expect("Failed to create test token")
    }

    /// Provision a user record and return a token for it
    pub async fn create_user(&self, username: &str) -> TestUser {
        let id = format!("user-{username}");
        self.state
            .db
            .upsert_user_profile(&id, username, &format!("Test {username}"))
            .await
            .unwrap();

        TestUser {
            token: self.token_for(&id, username),
            id,
        }
    }

    pub async fn get(&self, user: &TestUser, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(&user.token)
            .send()
            .await
            .unwrap()
    }

    pub async fn post(&self, user: &TestUser, path: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(&user.token)
            .send()
            .await
            .unwrap()
    }

    pub async fn post_json(&self, user: &TestUser, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(&user.token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn put(&self, user: &TestUser, path: &str) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(&user.token)
            .send()
            .await
            .unwrap()
    }

    pub async fn put_json(&self, user: &TestUser, path: &str, body: Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(&user.token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn patch(&self, user: &TestUser, path: &str) -> reqwest::Response {
        self.client
            .patch(self.url(path))
            .bearer_auth(&user.token)
            .send()
            .await
            .unwrap()
    }

    pub async fn delete(&self, user: &TestUser, path: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(&user.token)
            .send()
            .await
            .unwrap()
    }

    /// Register a post authored by `user` and return its id
    pub async fn create_post(&self, user: &TestUser) -> String {
        let response = self.post(user, "/api/content").await;
        assert_eq!(response.status(), 201);
        let body: Value = response.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    /// Register a story authored by `user` and return its id
    pub async fn create_story(&self, user: &TestUser) -> String {
        let response = self.post(user, "/api/stories").await;
        assert_eq!(response.status(), 201);
        let body: Value = response.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn unread_count(&self, user: &TestUser) -> i64 {
        let response = self.get(user, "/api/notifications/unread-count").await;
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        body["unreadCount"].as_i64().unwrap()
    }

    /// Notification type strings in the user's inbox, newest first
    pub async fn notification_types(&self, user: &TestUser) -> Vec<String> {
        let response = self.get(user, "/api/notifications?limit=100").await;
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["type"].as_str().unwrap().to_string())
            .collect()
    }
}
