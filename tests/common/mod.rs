#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

use devora_tasks::auth::{JwtMaker, PasswordHasher};
use devora_tasks::config::AppConfig;
use devora_tasks::database::MemoryStore;
use devora_tasks::{app, handlers, AppState};

pub const TOKEN_KEY: &str = "integration-test-key-0123456789ab";
pub const PASSWORD: &str = "83nicomoreno19";
/// Lowest bcrypt cost, keeps signups fast under test
const HASH_COST: u32 = 4;

pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
}

/// Start a fresh server on a free port with an empty in-memory store.
pub async fn spawn_server() -> Result<TestServer> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let base_url = format!("http://127.0.0.1:{}", port);

    let mut config = AppConfig::development();
    config.security.token_symmetric_key = TOKEN_KEY.to_string();
    config.security.password_hash_cost = HASH_COST;

    let state = AppState::new(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(JwtMaker::new(TOKEN_KEY)?),
        PasswordHasher::new(HASH_COST)?,
        handlers::schemas()?,
    );

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .context("failed to bind test listener")?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app(state)).await;
    });

    Ok(TestServer {
        base_url,
        client: reqwest::Client::new(),
    })
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Register `username` and return the created user's data.
    pub async fn register(&self, username: &str) -> Result<Value> {
        let res = self
            .client
            .post(self.url("/users"))
            .json(&json!({
                "username": username,
                "email": format!("{}@example.com", username),
                "password": PASSWORD,
            }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::CREATED, "register failed: {}", res.status());
        Ok(res.json::<Value>().await?["data"].clone())
    }

    /// Log in and return the access token.
    pub async fn login(&self, username: &str) -> Result<String> {
        let res = self
            .client
            .post(self.url("/users/login"))
            .json(&json!({ "username": username, "password": PASSWORD }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "login failed: {}", res.status());
        let body = res.json::<Value>().await?;
        body["data"]["access_token"]
            .as_str()
            .map(str::to_string)
            .context("missing access_token")
    }

    /// Register and log in; returns (user id, token).
    pub async fn signup(&self, username: &str) -> Result<(i64, String)> {
        let user = self.register(username).await?;
        let id = user["id"].as_i64().context("missing user id")?;
        let token = self.login(username).await?;
        Ok((id, token))
    }

    pub async fn create_task(&self, token: &str, title: &str) -> Result<Value> {
        let res = self
            .client
            .post(self.url("/tasks"))
            .bearer_auth(token)
            .json(&json!({ "title": title, "description": "from tests" }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::CREATED, "create task failed: {}", res.status());
        Ok(res.json::<Value>().await?["data"].clone())
    }
}
