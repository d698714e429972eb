use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tempfile::TempDir;

use formsink::config::Config;
use formsink::sink::relational::RelationalSink;
use formsink::submission::pipeline::SuccessPolicy;

/// A running test server with its own temp directory holding the journal
/// and database files.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub dir: TempDir,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn journal_path(&self) -> PathBuf {
        self.dir.path().join("responses.json")
    }

    /// Submit a JSON body, return (body, status).
    pub async fn submit(&self, data: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url("/submit"))
            .json(data)
            .send()
            .await
            .expect("submit request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Submit form-urlencoded data, return (body, status).
    pub async fn submit_form(&self, data: &[(&str, &str)]) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url("/submit"))
            .form(data)
            .send()
            .await
            .expect("submit form failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Make a GET request expecting a JSON body.
    pub async fn get_json(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Read the journal file as parsed JSON.
    pub async fn journal(&self) -> Value {
        let bytes = tokio::fs::read(self.journal_path())
            .await
            .expect("journal file missing");
        serde_json::from_slice(&bytes).expect("journal is not valid JSON")
    }
}

/// Spawn a test app with the default permissive success policy.
pub async fn spawn_app() -> TestApp {
    spawn_app_with_policy(SuccessPolicy::Any).await
}

pub async fn spawn_app_with_policy(policy: SuccessPolicy) -> TestApp {
    let dir = TempDir::new().expect("Failed to create temp dir");

    let config = Config {
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to a random port
        journal_path: dir.path().join("responses.json"),
        database_path: dir.path().join("responses.db"),
        sheet: None,
        sink_timeout: Duration::from_secs(5),
        success_policy: policy,
        cors_origins: vec![],
        max_body_size: 1_048_576,
        log_level: "warn".to_string(),
    };

    let relational = Arc::new(
        RelationalSink::open(&config.database_path)
            .await
            .expect("Failed to open test database"),
    );

    let app = formsink::build_app(relational, config).expect("Failed to build test app");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    let client = Client::new();

    TestApp { addr, client, dir }
}
